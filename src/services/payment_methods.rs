use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use tracing::instrument;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{payment_method, PaymentProvider};
use crate::errors::ServiceError;

/// Registry of accepted payment methods. Method names are normalized to
/// lowercase in exactly one place (`normalize`) so lookup never depends on
/// how the client spelled the display name.
#[derive(Clone)]
pub struct PaymentMethodService {
    db: Arc<DbPool>,
}

impl PaymentMethodService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    fn normalize(name: &str) -> String {
        name.trim().to_lowercase()
    }

    /// Lists methods currently offered to clients.
    #[instrument(skip(self))]
    pub async fn list_active(&self) -> Result<Vec<payment_method::Model>, ServiceError> {
        Ok(payment_method::Entity::find()
            .filter(payment_method::Column::IsActive.eq(true))
            .order_by_asc(payment_method::Column::Name)
            .all(&*self.db)
            .await?)
    }

    /// Resolves a method by name, requiring it to be active *now*: a
    /// method that was active when the client fetched the list but has been
    /// disabled since is rejected.
    #[instrument(skip(self))]
    pub async fn resolve_active(&self, name: &str) -> Result<payment_method::Model, ServiceError> {
        payment_method::Entity::find()
            .filter(payment_method::Column::Name.eq(Self::normalize(name)))
            .filter(payment_method::Column::IsActive.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::UnsupportedPaymentMethod(name.to_string()))
    }

    /// Registers a new payment method (admin).
    #[instrument(skip(self))]
    pub async fn create(
        &self,
        name: &str,
        description: Option<String>,
        provider: PaymentProvider,
        is_active: bool,
    ) -> Result<payment_method::Model, ServiceError> {
        let normalized = Self::normalize(name);
        if normalized.is_empty() {
            return Err(ServiceError::ValidationError(
                "payment method name must not be empty".to_string(),
            ));
        }

        let existing = payment_method::Entity::find()
            .filter(payment_method::Column::Name.eq(normalized.clone()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::InvalidOperation(format!(
                "payment method '{}' already exists",
                normalized
            )));
        }

        let now = Utc::now();
        let model = payment_method::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(normalized),
            description: Set(description),
            provider: Set(provider),
            is_active: Set(is_active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        Ok(model)
    }

    /// Enables or disables a method (admin).
    #[instrument(skip(self))]
    pub async fn set_active(
        &self,
        id: Uuid,
        is_active: bool,
    ) -> Result<payment_method::Model, ServiceError> {
        let method = payment_method::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Payment method {} not found", id)))?;

        let mut update: payment_method::ActiveModel = method.into();
        update.is_active = Set(is_active);
        update.updated_at = Set(Utc::now());
        Ok(update.update(&*self.db).await?)
    }
}
