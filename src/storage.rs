use crate::challenge::NewAccount;
use crate::entities;
use crate::errors::AuthError;
use crate::settings::Database as DbCfg;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Database, DatabaseConnection, EntityTrait, QueryFilter, Set,
    SqlErr,
};
use serde::{Deserialize, Serialize};

/// A persisted account, as the workflow layer sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub email: String,
    pub full_name: String,
    pub dob: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<entities::account::Model> for Account {
    fn from(model: entities::account::Model) -> Self {
        Self {
            email: model.email,
            full_name: model.full_name,
            dob: model.dob,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

pub async fn init(cfg: &DbCfg) -> Result<DatabaseConnection, AuthError> {
    let db = Database::connect(&cfg.url).await?;
    Ok(db)
}

/// Look up an account by its normalized email.
pub async fn find_account_by_email(
    db: &DatabaseConnection,
    email: &str,
) -> Result<Option<Account>, AuthError> {
    use entities::account::{Column, Entity};

    let model = Entity::find()
        .filter(Column::Email.eq(email))
        .one(db)
        .await?;

    Ok(model.map(Account::from))
}

/// Insert a new account. A uniqueness violation on the email surfaces
/// as `Conflict`; the caller decides the user-facing wording.
pub async fn create_account(
    db: &DatabaseConnection,
    fields: &NewAccount,
) -> Result<Account, AuthError> {
    let now = Utc::now().timestamp();

    let account = entities::account::ActiveModel {
        email: Set(fields.email.clone()),
        full_name: Set(fields.full_name.clone()),
        dob: Set(fields.dob.clone()),
        created_at: Set(now),
        updated_at: Set(now),
    };

    match account.insert(db).await {
        Ok(model) => Ok(model.into()),
        Err(err) => match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => Err(AuthError::Conflict(
                "An account with this email already exists.".to_string(),
            )),
            _ => Err(err.into()),
        },
    }
}
