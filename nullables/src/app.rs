//! Nullable application connection.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tessel_rpc::{AppConn, AppError};
use tessel_types::{RequestQuery, ResponseCheckTx, ResponseInfo, ResponseQuery, Tx};

/// Code returned for queries on paths nothing was stored under.
pub const CODE_UNKNOWN_PATH: u32 = 1;

struct State {
    info: ResponseInfo,
    check: ResponseCheckTx,
    values: HashMap<String, Vec<u8>>,
    checked: Vec<Tx>,
    offline: bool,
}

/// A programmable application: answers `info`, serves stored query values
/// by path and validates with a fixed check result.
pub struct NullApp {
    state: Mutex<State>,
}

impl NullApp {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                info: ResponseInfo {
                    data: "null-app".to_string(),
                    version: "0.1.0".to_string(),
                    ..Default::default()
                },
                check: ResponseCheckTx::ok(),
                values: HashMap::new(),
                checked: Vec::new(),
                offline: false,
            }),
        }
    }

    pub fn set_info(&self, info: ResponseInfo) {
        self.state.lock().unwrap().info = info;
    }

    pub fn set_check_response(&self, response: ResponseCheckTx) {
        self.state.lock().unwrap().check = response;
    }

    /// Serve `value` for queries on `path`.
    pub fn store(&self, path: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.state
            .lock()
            .unwrap()
            .values
            .insert(path.into(), value.into());
    }

    /// Make every call fail as if the connection was lost.
    pub fn go_offline(&self) {
        self.state.lock().unwrap().offline = true;
    }

    /// Transactions passed to `check_tx`.
    pub fn checked(&self) -> Vec<Tx> {
        self.state.lock().unwrap().checked.clone()
    }

    fn online(&self) -> Result<std::sync::MutexGuard<'_, State>, AppError> {
        let state = self.state.lock().unwrap();
        if state.offline {
            return Err(AppError::Connection("application offline".to_string()));
        }
        Ok(state)
    }
}

impl Default for NullApp {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AppConn for NullApp {
    async fn info(&self) -> Result<ResponseInfo, AppError> {
        Ok(self.online()?.info.clone())
    }

    async fn query(&self, request: RequestQuery) -> Result<ResponseQuery, AppError> {
        let state = self.online()?;
        let height = if request.height == 0 {
            state.info.last_block_height
        } else {
            request.height
        };
        Ok(match state.values.get(&request.path) {
            Some(value) => ResponseQuery {
                key: request.data,
                value: value.clone(),
                height,
                ..Default::default()
            },
            None => ResponseQuery {
                code: CODE_UNKNOWN_PATH,
                log: format!("unknown path {}", request.path),
                key: request.data,
                height,
                ..Default::default()
            },
        })
    }

    async fn check_tx(&self, tx: &Tx) -> Result<ResponseCheckTx, AppError> {
        let mut state = self.online()?;
        state.checked.push(tx.clone());
        Ok(state.check.clone())
    }
}
