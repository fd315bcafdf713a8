pub mod dispatch;
pub mod reconcile;
pub mod scheduler;

pub use dispatch::{DispatchOutcome, ScanDispatcher};
pub use reconcile::{ReconcileStats, Reconciler};
pub use scheduler::ReconcileScheduler;
