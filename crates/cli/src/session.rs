//! Request handling for a single hosted ledger.
//!
//! A session owns an in-memory store and bus, a `LedgerService` created from
//! `LedgerConfig`, and a holders projection fed from the bus after every
//! committed command.

use std::sync::Arc;

use serde_json::{Value as JsonValue, json};

use tokenledger_events::{EventBus, EventEnvelope, InMemoryEventBus, Subscription};
use tokenledger_infra::{
    DispatchError, HoldersProjection, InMemoryEventStore, LedgerConfig, LedgerService,
};
use tokenledger_core::{DomainError, LedgerId};
use tokenledger_token::Notification;

use crate::dto::Request;
use crate::errors::{dispatch_error_to_response, json_error};

type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

pub struct Session {
    service: LedgerService<InMemoryEventStore, Bus>,
    holders: HoldersProjection,
    subscription: Subscription<EventEnvelope<JsonValue>>,
}

impl Session {
    /// Open a fresh ledger and issue the configured supply to the creator.
    pub fn start(config: &LedgerConfig) -> Result<Self, DispatchError> {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        // Subscribe before creation so the issuance reaches the projection.
        let subscription = bus.subscribe();
        let ledger_id = LedgerId::new();
        let service = LedgerService::open(ledger_id, InMemoryEventStore::new(), bus)?;

        service.create(config.creator, config.metadata(), config.initial_units)?;

        let session = Self {
            service,
            holders: HoldersProjection::new(ledger_id),
            subscription,
        };
        session.sync_projection();

        tracing::info!(
            %ledger_id,
            name = %config.name,
            symbol = %config.symbol,
            decimals = config.decimals,
            creator = %config.creator,
            "ledger session started"
        );
        Ok(session)
    }

    pub fn service(&self) -> &LedgerService<InMemoryEventStore, Bus> {
        &self.service
    }

    pub fn holders(&self) -> &HoldersProjection {
        &self.holders
    }

    /// Handle one input line, always producing exactly one response.
    pub fn handle_line(&self, line: &str) -> JsonValue {
        let request: Request = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(error = %e, "malformed request");
                return json_error("malformed_request", e.to_string());
            }
        };

        let op = request.op();
        match self.handle(request) {
            Ok(body) => body,
            Err(err) => {
                tracing::debug!(op, error = %err, "request failed");
                dispatch_error_to_response(&err)
            }
        }
    }

    pub fn handle(&self, request: Request) -> Result<JsonValue, DispatchError> {
        match request {
            Request::Metadata => {
                let metadata = self
                    .service
                    .metadata()?
                    .ok_or(DispatchError::Rejected(DomainError::NotCreated))?;
                Ok(json!({
                    "ok": true,
                    "name": metadata.name,
                    "symbol": metadata.symbol,
                    "decimals": metadata.decimals,
                    "total_supply": self.service.total_supply()?,
                }))
            }
            Request::TotalSupply => Ok(json!({
                "ok": true,
                "total_supply": self.service.total_supply()?,
            })),
            Request::BalanceOf { account } => Ok(json!({
                "ok": true,
                "balance": self.service.balance_of(account)?,
            })),
            Request::Allowance { owner, spender } => Ok(json!({
                "ok": true,
                "allowance": self.service.allowance(owner, spender)?,
            })),
            Request::Transfer { caller, to, amount } => {
                let notification = self.service.transfer(caller, to, amount)?;
                Ok(self.committed(notification))
            }
            Request::Approve {
                caller,
                spender,
                amount,
            } => {
                let notification = self.service.approve(caller, spender, amount)?;
                Ok(self.committed(notification))
            }
            Request::TransferFrom {
                caller,
                from,
                to,
                amount,
            } => {
                let notification = self.service.transfer_from(caller, from, to, amount)?;
                Ok(self.committed(notification))
            }
            Request::Holders => {
                let holders = self
                    .holders
                    .read(|book| {
                        book.holders()
                            .into_iter()
                            .map(|(account, balance)| json!({ "account": account, "balance": balance }))
                            .collect::<Vec<_>>()
                    })
                    .map_err(|_| DispatchError::Poisoned)?;
                Ok(json!({ "ok": true, "holders": holders }))
            }
        }
    }

    fn committed(&self, notification: Notification) -> JsonValue {
        self.sync_projection();
        json!({ "ok": true, "notification": notification })
    }

    fn sync_projection(&self) {
        if let Err(e) = self.holders.catch_up(&self.subscription) {
            tracing::error!(error = %e, "holders projection failed to catch up");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokenledger_core::Address;

    const OWNER: &str = "0x00000000000000000000000000000000000000a1";
    const USER: &str = "0x00000000000000000000000000000000000000b2";
    const SPENDER: &str = "0x00000000000000000000000000000000000000c3";

    fn session() -> Session {
        let config = LedgerConfig {
            name: "TestToken".to_string(),
            symbol: "TT".to_string(),
            decimals: 2,
            initial_units: 100,
            creator: OWNER.parse().unwrap(),
        };
        Session::start(&config).unwrap()
    }

    fn call(session: &Session, line: String) -> JsonValue {
        session.handle_line(&line)
    }

    #[test]
    fn metadata_reflects_config() {
        let s = session();
        let body = s.handle_line(r#"{"op":"metadata"}"#);
        assert_eq!(
            body,
            json!({
                "ok": true,
                "name": "TestToken",
                "symbol": "TT",
                "decimals": 2,
                "total_supply": "10000",
            })
        );
    }

    #[test]
    fn transfer_returns_notification_and_moves_balance() {
        let s = session();
        let body = call(
            &s,
            format!(r#"{{"op":"transfer","caller":"{OWNER}","to":"{USER}","amount":"250"}}"#),
        );
        assert_eq!(body["ok"], true);
        assert_eq!(body["notification"]["event"], "Transfer");
        assert_eq!(body["notification"]["amount"], "250");

        let balance = call(&s, format!(r#"{{"op":"balance_of","account":"{USER}"}}"#));
        assert_eq!(balance, json!({ "ok": true, "balance": "250" }));
    }

    #[test]
    fn rejection_reports_reason() {
        let s = session();
        let body = call(
            &s,
            format!(r#"{{"op":"transfer","caller":"{USER}","to":"{OWNER}","amount":"1"}}"#),
        );
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], "ERC20: transfer amount exceeds balance");
    }

    #[test]
    fn delegated_transfer_flow() {
        let s = session();
        call(
            &s,
            format!(r#"{{"op":"approve","caller":"{OWNER}","spender":"{SPENDER}","amount":"40"}}"#),
        );
        let moved = call(
            &s,
            format!(
                r#"{{"op":"transfer_from","caller":"{SPENDER}","from":"{OWNER}","to":"{USER}","amount":"15"}}"#
            ),
        );
        assert_eq!(moved["ok"], true);

        let allowance = call(
            &s,
            format!(r#"{{"op":"allowance","owner":"{OWNER}","spender":"{SPENDER}"}}"#),
        );
        assert_eq!(allowance["allowance"], "25");
    }

    #[test]
    fn holders_follow_committed_commands() {
        let s = session();
        call(
            &s,
            format!(r#"{{"op":"transfer","caller":"{OWNER}","to":"{USER}","amount":"10000"}}"#),
        );

        let body = s.handle_line(r#"{"op":"holders"}"#);
        assert_eq!(body["holders"], json!([{ "account": USER, "balance": "10000" }]));
        assert_eq!(
            s.holders().read(|book| book.balance_of(Address::from_low_u64(0xa1))).unwrap(),
            tokenledger_core::Amount::ZERO
        );
    }

    #[test]
    fn malformed_lines_get_an_error_response() {
        let s = session();
        let body = s.handle_line("not json");
        assert_eq!(body["ok"], false);
        assert_eq!(body["code"], "malformed_request");
    }
}
