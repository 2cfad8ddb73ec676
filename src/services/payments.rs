use std::sync::Arc;

use chrono::Utc;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{order, payment_transaction, PaymentStatus, TransactionStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::gateway::GatewayRegistry;

/// Outcome reported by a payment provider for one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
}

impl PaymentOutcome {
    fn transaction_status(self) -> TransactionStatus {
        match self {
            PaymentOutcome::Succeeded => TransactionStatus::Success,
            PaymentOutcome::Failed => TransactionStatus::Failed,
        }
    }

    fn payment_status(self) -> PaymentStatus {
        match self {
            PaymentOutcome::Succeeded => PaymentStatus::Paid,
            PaymentOutcome::Failed => PaymentStatus::Failed,
        }
    }
}

/// Result of applying a confirmation. `changed` is false when the
/// notification was a replay and nothing moved.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmationApplied {
    pub order_id: Uuid,
    pub transaction_id: Uuid,
    pub changed: bool,
}

/// Applies asynchronous payment outcomes (webhook notifications or internal
/// fulfillment events) to the transaction ledger and the owning order.
///
/// Idempotent by construction: a transaction already in the target state is
/// a no-op, so replayed notifications neither double-apply state changes
/// nor re-emit events.
#[derive(Clone)]
pub struct PaymentConfirmationService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    gateways: GatewayRegistry,
}

impl PaymentConfirmationService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender, gateways: GatewayRegistry) -> Self {
        Self {
            db,
            event_sender,
            gateways,
        }
    }

    #[instrument(skip(self))]
    pub async fn confirm(
        &self,
        provider_transaction_id: &str,
        outcome: PaymentOutcome,
    ) -> Result<ConfirmationApplied, ServiceError> {
        let transaction = payment_transaction::Entity::find()
            .filter(
                payment_transaction::Column::ProviderTransactionId.eq(provider_transaction_id),
            )
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::UnknownTransaction(provider_transaction_id.to_string())
            })?;

        let target = outcome.transaction_status();
        if transaction.status == target {
            // Replayed notification; the state already reflects it.
            return Ok(ConfirmationApplied {
                order_id: transaction.order_id,
                transaction_id: transaction.id,
                changed: false,
            });
        }
        if transaction.status.is_terminal() {
            // A settled ledger row never flips; a late contradictory
            // notification is recorded in the logs and discarded.
            warn!(
                transaction_id = %transaction.id,
                current = ?transaction.status,
                ?outcome,
                "ignoring outcome for settled transaction"
            );
            return Ok(ConfirmationApplied {
                order_id: transaction.order_id,
                transaction_id: transaction.id,
                changed: false,
            });
        }

        let order_id = transaction.order_id;
        let transaction_id = transaction.id;
        let observed_status = transaction.status;
        let now = Utc::now();

        let txn = self.db.begin().await?;

        // Conditional on the status we read, so concurrent deliveries of
        // the same notification settle the row exactly once.
        let updated = payment_transaction::Entity::update_many()
            .col_expr(payment_transaction::Column::Status, Expr::value(target))
            .col_expr(payment_transaction::Column::UpdatedAt, Expr::value(now))
            .filter(payment_transaction::Column::Id.eq(transaction_id))
            .filter(payment_transaction::Column::Status.eq(observed_status))
            .exec(&txn)
            .await?;
        if updated.rows_affected == 0 {
            return Ok(ConfirmationApplied {
                order_id,
                transaction_id,
                changed: false,
            });
        }

        let order = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "transaction {} references missing order {}",
                    transaction_id, order_id
                ))
            })?;

        let target_payment = outcome.payment_status();
        if order.payment_status.can_transition_to(target_payment) {
            let mut order_update: order::ActiveModel = order.into();
            order_update.payment_status = Set(target_payment);
            order_update.updated_at = Set(now);
            order_update.update(&txn).await?;
        } else if order.payment_status != target_payment {
            // The ledger row is still recorded, but an order that has moved
            // on (e.g. refunded) keeps its payment status.
            warn!(
                %order_id,
                current = order.payment_status.as_str(),
                target = target_payment.as_str(),
                "skipping payment status update; transition not allowed"
            );
        }

        txn.commit().await?;

        let event = match outcome {
            PaymentOutcome::Succeeded => Event::PaymentConfirmed {
                order_id,
                transaction_id,
            },
            PaymentOutcome::Failed => Event::PaymentFailed {
                order_id,
                transaction_id,
            },
        };
        self.event_sender.send(event).await;

        info!(%order_id, %transaction_id, ?outcome, "payment outcome applied");
        Ok(ConfirmationApplied {
            order_id,
            transaction_id,
            changed: true,
        })
    }

    /// Pulls the current status from the provider and applies it through
    /// the same guarded path. Used when a notification carries only a
    /// transaction id, or for manual reconciliation.
    #[instrument(skip(self))]
    pub async fn reconcile(
        &self,
        provider_transaction_id: &str,
    ) -> Result<ConfirmationApplied, ServiceError> {
        let transaction = payment_transaction::Entity::find()
            .filter(
                payment_transaction::Column::ProviderTransactionId.eq(provider_transaction_id),
            )
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::UnknownTransaction(provider_transaction_id.to_string())
            })?;

        let gateway = self.gateways.get(transaction.provider)?;
        let status = gateway.confirm(provider_transaction_id).await?;

        match status {
            TransactionStatus::Success => {
                self.confirm(provider_transaction_id, PaymentOutcome::Succeeded)
                    .await
            }
            TransactionStatus::Failed => {
                self.confirm(provider_transaction_id, PaymentOutcome::Failed)
                    .await
            }
            _ => Ok(ConfirmationApplied {
                order_id: transaction.order_id,
                transaction_id: transaction.id,
                changed: false,
            }),
        }
    }

    /// Refunds a settled transaction (admin). The provider is refunded
    /// first; only then does the ledger row flip, so a gateway failure
    /// leaves everything untouched. Replays are no-ops.
    #[instrument(skip(self))]
    pub async fn refund(
        &self,
        provider_transaction_id: &str,
    ) -> Result<ConfirmationApplied, ServiceError> {
        let transaction = payment_transaction::Entity::find()
            .filter(
                payment_transaction::Column::ProviderTransactionId.eq(provider_transaction_id),
            )
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::UnknownTransaction(provider_transaction_id.to_string())
            })?;

        if transaction.is_refunded {
            return Ok(ConfirmationApplied {
                order_id: transaction.order_id,
                transaction_id: transaction.id,
                changed: false,
            });
        }
        if transaction.status != TransactionStatus::Success {
            return Err(ServiceError::InvalidOperation(format!(
                "transaction {} is not refundable in status {:?}",
                transaction.id, transaction.status
            )));
        }

        let amount_minor = (transaction.amount * Decimal::from(100))
            .round()
            .to_i64()
            .ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "refund amount {} out of range",
                    transaction.amount
                ))
            })?;

        let gateway = self.gateways.get(transaction.provider)?;
        gateway.refund(provider_transaction_id, amount_minor).await?;

        let order_id = transaction.order_id;
        let transaction_id = transaction.id;
        let amount = transaction.amount;
        let now = Utc::now();

        let txn = self.db.begin().await?;

        let mut tx_update: payment_transaction::ActiveModel = transaction.into();
        tx_update.status = Set(TransactionStatus::Refunded);
        tx_update.is_refunded = Set(true);
        tx_update.refund_amount = Set(amount);
        tx_update.updated_at = Set(now);
        tx_update.update(&txn).await?;

        let order = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "transaction {} references missing order {}",
                    transaction_id, order_id
                ))
            })?;
        if order.payment_status.can_transition_to(PaymentStatus::Refunded) {
            let mut order_update: order::ActiveModel = order.into();
            order_update.payment_status = Set(PaymentStatus::Refunded);
            order_update.updated_at = Set(now);
            order_update.update(&txn).await?;
        }

        txn.commit().await?;

        self.event_sender
            .send(Event::PaymentRefunded {
                order_id,
                transaction_id,
            })
            .await;

        info!(%order_id, %transaction_id, "refund applied");
        Ok(ConfirmationApplied {
            order_id,
            transaction_id,
            changed: true,
        })
    }
}
