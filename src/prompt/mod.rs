mod engine;

pub use engine::InquirePrompter;
