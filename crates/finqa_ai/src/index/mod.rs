pub mod dense;
pub mod lexical;

pub use dense::{meta_passage, query_passage, DenseIndex, DenseIndexStatus};
pub use lexical::{tokenize, LexicalIndex};
