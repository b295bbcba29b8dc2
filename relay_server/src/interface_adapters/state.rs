use crate::use_cases::RelayEvent;
use tokio::sync::mpsc;

#[derive(Clone)]
pub struct AppState {
    // Events flowing from every connection into the single relay task.
    pub relay_tx: mpsc::Sender<RelayEvent>,
    // Capacity of the outbound queue created for each new connection.
    pub outbox_capacity: usize,
    // Unparseable messages tolerated per connection before closing it (0 never closes).
    pub max_invalid_messages: u32,
}
