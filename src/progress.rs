use std::{
  collections::HashMap,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
  time::Duration,
};

use futures::Stream;
use tokio::sync::watch;

use crate::{Error, Result};

const MAX_TOKEN_LEN: usize = 64;

type Sender = Arc<watch::Sender<Option<f64>>>;

struct Entry {
  tx: Sender,
  published: bool,
}

/// Relays conversion progress from a buffered download to whoever watches
/// the same token. An entry only lives as long as the download or the
/// watcher that created it.
#[derive(Clone)]
pub struct ProgressBoard {
  entries: Arc<Mutex<HashMap<String, Entry>>>,
  idle_timeout: Duration,
}

pub struct ProgressPublisher {
  board: ProgressBoard,
  token: String,
  tx: Sender,
}

pub struct ProgressSubscription {
  board: ProgressBoard,
  token: String,
  rx: watch::Receiver<Option<f64>>,
}

pub fn check_token(token: Option<&str>) -> Result<&str> {
  match token {
    Some(token)
      if !token.is_empty()
        && token.len() <= MAX_TOKEN_LEN
        && token.bytes().all(|b| b.is_ascii_alphanumeric()) =>
    {
      Ok(token)
    }
    _ => Err(Error::InvalidToken),
  }
}

impl ProgressBoard {
  pub fn new(idle_timeout: Duration) -> Self {
    Self {
      entries: Default::default(),
      idle_timeout,
    }
  }

  fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn sender(&self, token: &str, publish: bool) -> Sender {
    let mut entries = self.entries();
    let entry = entries.entry(token.to_owned()).or_insert_with(|| Entry {
      tx: Arc::new(watch::channel(None).0),
      published: false,
    });
    entry.published |= publish;
    entry.tx.clone()
  }

  pub fn publish(&self, token: &str) -> ProgressPublisher {
    ProgressPublisher {
      board: self.clone(),
      token: token.to_owned(),
      tx: self.sender(token, true),
    }
  }

  pub fn subscribe(&self, token: &str) -> ProgressSubscription {
    ProgressSubscription {
      board: self.clone(),
      token: token.to_owned(),
      rx: self.sender(token, false).subscribe(),
    }
  }

  #[cfg(test)]
  fn len(&self) -> usize {
    self.entries().len()
  }
}

impl ProgressPublisher {
  pub fn report(&self, fraction: f64) {
    self.tx.send_replace(Some(fraction));
  }
}

impl Drop for ProgressPublisher {
  // watchers see the channel close once this entry is gone
  fn drop(&mut self) {
    let mut entries = self.board.entries();
    let ours = entries
      .get(&self.token)
      .map_or(false, |e| Arc::ptr_eq(&e.tx, &self.tx));
    if ours {
      entries.remove(&self.token);
    }
  }
}

impl ProgressSubscription {
  /// Fractions as they are reported. Ends when the download finishes or
  /// nothing is reported for the board's idle timeout.
  pub fn fractions(self) -> impl Stream<Item = f64> + Send + 'static {
    futures::stream::unfold(self, next_fraction)
  }
}

async fn next_fraction(
  mut sub: ProgressSubscription,
) -> Option<(f64, ProgressSubscription)> {
  let idle_timeout = sub.board.idle_timeout;
  loop {
    match tokio::time::timeout(idle_timeout, sub.rx.changed()).await {
      Ok(Ok(())) => {
        let fraction = *sub.rx.borrow_and_update();
        if let Some(fraction) = fraction {
          return Some((fraction, sub));
        }
      }
      // closed or idle
      _ => return None,
    }
  }
}

impl Drop for ProgressSubscription {
  // a watcher that showed up without a download cleans up after itself
  fn drop(&mut self) {
    let mut entries = self.board.entries();
    if matches!(entries.get(&self.token), Some(e) if !e.published) {
      entries.remove(&self.token);
    }
  }
}
