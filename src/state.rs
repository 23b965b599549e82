use crate::{
    config::AuthConfig,
    db::{DbPool, OrmConn},
    gateway::PaymentGateway,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub gateway: PaymentGateway,
    pub auth: AuthConfig,
}
