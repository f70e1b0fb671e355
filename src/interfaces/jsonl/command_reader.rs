use crate::application::commands::{CreateOrder, NewItem, NewPayment, UpdateItem};
use crate::domain::item::ItemStatus;
use crate::domain::order::OrderStatus;
use crate::error::{OrderError, Result};
use serde::Deserialize;
use std::io::BufRead;

/// One scripted call against the order engine.
///
/// Orders are addressed by a script-local label (`ref`) given when the order
/// is created. Items are addressed by their position in the order's item
/// list, oldest first.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    CreateOrder {
        #[serde(rename = "ref")]
        label: String,
        #[serde(flatten)]
        order: CreateOrder,
    },
    AddItem {
        #[serde(rename = "ref")]
        label: String,
        #[serde(flatten)]
        item: NewItem,
    },
    UpdateItem {
        #[serde(rename = "ref")]
        label: String,
        item: usize,
        #[serde(flatten)]
        update: UpdateItem,
    },
    RemoveItem {
        #[serde(rename = "ref")]
        label: String,
        item: usize,
    },
    UpdateStatus {
        #[serde(rename = "ref")]
        label: String,
        status: OrderStatus,
    },
    UpdateItemStatus {
        #[serde(rename = "ref")]
        label: String,
        item: usize,
        status: ItemStatus,
    },
    AddPayment {
        #[serde(rename = "ref")]
        label: String,
        #[serde(flatten)]
        payment: NewPayment,
    },
}

impl Command {
    pub fn label(&self) -> &str {
        match self {
            Command::CreateOrder { label, .. }
            | Command::AddItem { label, .. }
            | Command::UpdateItem { label, .. }
            | Command::RemoveItem { label, .. }
            | Command::UpdateStatus { label, .. }
            | Command::UpdateItemStatus { label, .. }
            | Command::AddPayment { label, .. } => label,
        }
    }
}

/// Reads commands from a JSON-lines source.
///
/// Blank lines and lines starting with `#` are skipped. A line that fails to
/// parse yields an error and does not stop the stream.
pub struct CommandReader<R: BufRead> {
    source: R,
}

impl<R: BufRead> CommandReader<R> {
    pub fn new(source: R) -> Self {
        Self { source }
    }

    /// Returns an iterator that lazily reads and deserializes commands.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.source
            .lines()
            .enumerate()
            .filter_map(|(index, line)| match line {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() || trimmed.starts_with('#') {
                        return None;
                    }
                    Some(parse_line(index + 1, trimmed))
                }
                Err(err) => Some(Err(OrderError::from(err))),
            })
    }
}

fn parse_line(line_number: usize, line: &str) -> Result<Command> {
    serde_json::from_str(line)
        .map_err(|err| OrderError::validation(format!("line {line_number}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderType;
    use crate::domain::payment::PaymentMethod;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_stream() {
        let data = r#"
# breakfast rush
{"op":"create_order","ref":"t1","order_type":"DINE_IN","table_number":"7","items":[{"product_id":"6f1c2a5e-3b0d-4c1e-9a4f-1d2e3f4a5b6c","quantity":2}]}
{"op":"add_payment","ref":"t1","method":"CASH","amount":"50000","amount_received":"100000"}
{"op":"update_status","ref":"t1","status":"PREPARING"}
"#;
        let reader = CommandReader::new(data.as_bytes());
        let commands: Vec<Command> = reader.commands().map(|c| c.unwrap()).collect();

        assert_eq!(commands.len(), 3);
        match &commands[0] {
            Command::CreateOrder { label, order } => {
                assert_eq!(label, "t1");
                assert_eq!(order.order_type, OrderType::DineIn);
                assert_eq!(order.items[0].quantity, 2);
                assert_eq!(order.table_number.as_deref(), Some("7"));
            }
            other => panic!("unexpected command {other:?}"),
        }
        match &commands[1] {
            Command::AddPayment { payment, .. } => {
                assert_eq!(payment.method, PaymentMethod::Cash);
                assert_eq!(payment.amount, dec!(50000));
                assert_eq!(payment.amount_received, Some(dec!(100000)));
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(
            commands[2],
            Command::UpdateStatus {
                label: "t1".to_string(),
                status: OrderStatus::Preparing
            }
        );
    }

    #[test]
    fn test_reader_item_commands() {
        let data = concat!(
            r#"{"op":"update_item","ref":"a","item":0,"quantity":3,"notes":"no ice"}"#,
            "\n",
            r#"{"op":"update_item_status","ref":"a","item":1,"status":"READY"}"#,
        );
        let commands: Vec<Command> = CommandReader::new(data.as_bytes())
            .commands()
            .map(|c| c.unwrap())
            .collect();

        match &commands[0] {
            Command::UpdateItem { item, update, .. } => {
                assert_eq!(*item, 0);
                assert_eq!(update.quantity, 3);
                assert_eq!(update.notes.as_deref(), Some("no ice"));
                assert_eq!(update.discount, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(commands[1].label(), "a");
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = "{\"op\":\"refund\",\"ref\":\"x\"}\n{\"op\":\"remove_item\",\"ref\":\"x\",\"item\":1}";
        let results: Vec<Result<Command>> = CommandReader::new(data.as_bytes()).commands().collect();

        assert_eq!(results.len(), 2);
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));
        assert!(err.to_string().starts_with("line 1:"));
        assert!(results[1].is_ok());
    }
}
