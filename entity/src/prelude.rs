pub use super::receipt_validations::Entity as ReceiptValidations;
