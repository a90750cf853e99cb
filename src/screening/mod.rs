//! Candidate screening.
//!
//! Every inbound email flows through:
//! 1. `IntakeFilter::evaluate()`: drop bounces, auto-replies, self-sent mail
//! 2. `CandidateExtractor::extract()`: name, position, experience, résumé text
//! 3. `KeywordScreener::screen()`: required-keyword match
//! 4. `EmailTemplates::for_candidate()`: acceptance or rejection reply

pub mod candidate;
pub mod extract;
pub mod keywords;
pub mod rules;
pub mod templates;

pub use candidate::{Candidate, CandidateStatus, ScreeningResult};
pub use extract::CandidateExtractor;
pub use keywords::KeywordScreener;
pub use rules::{IntakeFilter, SkipReason};
pub use templates::EmailTemplates;
