mod pdf;
mod text;

pub use pdf::PdfLoader;
pub use text::TextLoader;
