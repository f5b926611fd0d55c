pub mod taintremover;
