pub mod ledger;
pub mod memory;
pub mod models;
pub mod repository;
pub mod workflow;

pub use ledger::{CreditError, CreditLedger};
pub use models::{
    AgentOwnerConnection, ConnectionStatus, CreditAuthorization, CreditTransaction, TransactionKind,
};
pub use repository::{CreditRepository, DebitOutcome};
pub use workflow::{ConnectionRequestWorkflow, WorkflowError};
