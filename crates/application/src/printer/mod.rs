mod dispatcher;
mod receipt_printer;

pub use dispatcher::{DispatchHandle, WriteDispatcher};
pub use receipt_printer::ReceiptPrinter;
