//! The paired-client table, shared between the UC-Auth engine (which writes
//! it on successful pairing/promotion) and the restriction engine (which
//! reads a client's key to derive its authorisation digest).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct ClientCredential {
    pub key: Vec<u8>,
    pub name: String,
}

pub type ClientTable = Arc<Mutex<HashMap<String, ClientCredential>>>;

pub fn new_table() -> ClientTable {
    Arc::new(Mutex::new(HashMap::new()))
}
