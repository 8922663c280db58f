pub mod delimited;
pub mod discovery;
