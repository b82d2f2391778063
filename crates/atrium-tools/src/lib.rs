//! Tool Mediation: validate, assess risk, gate behind an
//! approval, then run the asynchronous client-executed tool protocol.
//!
//! - [`validation`]: path traversal, command allow/deny, size limits — run
//!   before any approval is ever opened.
//! - [`risk`]: the [`risk::RiskAssessor`] that classifies a tool call.
//! - [`mediator`]: [`mediator::ToolMediator`], the thing `server` calls.

mod mediator;
mod risk;
mod validation;

pub use mediator::ToolMediator;
pub use risk::RiskAssessor;
pub use validation::validate_tool_call;
