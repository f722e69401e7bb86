#[derive(Debug, Clone)]
pub struct Document {
    pub content: String,
    pub filename: String,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub content: String,
    pub chunk_index: usize,
}
