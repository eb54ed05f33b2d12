pub mod question;
pub mod response;
pub mod session;

pub use question::{Question, QuestionType};
pub use response::{Evaluation, Response, SubScores};
pub use session::PracticeSession;
