pub mod boolean;
pub mod embedded_json;
pub mod structured_text;
pub mod timestamp;
