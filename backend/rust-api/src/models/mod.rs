pub mod answer;
pub mod classification;
pub mod content;
pub mod hint;

pub use answer::StepSpec;
pub use classification::{BehaviorCategory, ClassificationResult};
pub use content::QuestionContent;
pub use hint::{BehaviorType, Difficulty, HintKey, HintRecord, HintSource, SessionHintSet};
