pub mod gemini;
pub mod you_com;

pub use gemini::GeminiExplanationProvider;
pub use you_com::YouComExplanationProvider;
