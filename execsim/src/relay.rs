//! # relay — confirmation channel back to the pipeline
//!
//! One long-lived connection, reused for every fill.  Before each write the
//! socket is checked for a hang-up (the pipeline never writes on it, so a
//! readable EOF means it went away); a failed write is retried once on a
//! fresh connection before the confirmation is given up.

use std::io::ErrorKind;

use tokio::{
    io::AsyncWriteExt,
    net::TcpStream,
    sync::mpsc,
    time::{sleep, timeout},
};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::ledger::Confirmation;

pub struct ConfirmLink {
    config: Config,
    conn:   Option<TcpStream>,
}

impl ConfirmLink {
    pub fn new(config: Config) -> Self {
        Self { config, conn: None }
    }

    /// Writes one line; `false` = confirmation dropped.
    pub async fn deliver(&mut self, line: &[u8]) -> bool {
        for attempt in 1..=2 {
            if self.conn.as_ref().is_some_and(peer_closed) {
                info!(addr = %self.config.confirm_addr, "Pipeline closed confirmation channel — reconnecting");
                self.conn = None;
            }
            if self.conn.is_none() {
                self.conn = self.connect().await;
            }
            let Some(stream) = self.conn.as_mut() else {
                return false;
            };

            match timeout(self.config.write_timeout, stream.write_all(line)).await {
                Ok(Ok(())) => return true,
                Ok(Err(e)) => warn!(attempt, error = %e, "Confirmation write failed"),
                Err(_) => warn!(attempt, "Confirmation write timed out"),
            }
            self.conn = None;
        }
        false
    }

    async fn connect(&self) -> Option<TcpStream> {
        let addr = &self.config.confirm_addr;
        match timeout(self.config.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                info!(%addr, "🔗 Confirmation channel connected");
                Some(stream)
            }
            Ok(Err(e)) => {
                warn!(%addr, error = %e, "Confirmation connect failed");
                sleep(self.config.retry_backoff).await;
                None
            }
            Err(_) => {
                warn!(%addr, "Confirmation connect timed out");
                sleep(self.config.retry_backoff).await;
                None
            }
        }
    }
}

fn peer_closed(stream: &TcpStream) -> bool {
    let mut byte = [0u8; 1];
    match stream.try_read(&mut byte) {
        Ok(0) => true,
        Ok(_) => false,
        Err(e) if e.kind() == ErrorKind::WouldBlock => false,
        Err(_) => true,
    }
}

/// Sender task: drains the ledger's confirmations in order.
pub async fn send_confirmations(mut confirmations: mpsc::Receiver<Confirmation>, config: Config) {
    let mut link = ConfirmLink::new(config);

    while let Some(confirmation) = confirmations.recv().await {
        let mut line = match serde_json::to_vec(&confirmation) {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "❌ Failed to encode confirmation");
                continue;
            }
        };
        line.push(b'\n');

        if link.deliver(&line).await {
            info!(action = %confirmation.action, price = confirmation.price, "📤 Confirmation sent");
        } else {
            error!(action = %confirmation.action, price = confirmation.price, "❌ Confirmation dropped — pipeline unreachable");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    fn test_config(confirm_addr: String) -> Config {
        Config {
            intent_addr:     "127.0.0.1:0".into(),
            confirm_addr,
            starting_cash:   0.0,
            retry_backoff:   Duration::from_millis(20),
            connect_timeout: Duration::from_millis(500),
            write_timeout:   Duration::from_millis(500),
        }
    }

    fn line(price: f64) -> Vec<u8> {
        format!("{{\"action\":\"SELL\",\"price\":{price}}}\n").into_bytes()
    }

    async fn read_prices(stream: TcpStream, count: usize) -> Vec<f64> {
        let mut lines = BufReader::new(stream).lines();
        let mut prices = Vec::new();
        while prices.len() < count {
            let next = tokio::time::timeout(Duration::from_secs(2), lines.next_line())
                .await
                .expect("confirmation should arrive")
                .unwrap()
                .expect("connection open");
            let value: serde_json::Value = serde_json::from_str(&next).unwrap();
            prices.push(value["price"].as_f64().unwrap());
        }
        prices
    }

    #[tokio::test]
    async fn test_no_confirmation_lost_across_pipeline_restart() {
        let pipeline = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = pipeline.local_addr().unwrap().to_string();
        let mut link = ConfirmLink::new(test_config(addr.clone()));

        assert!(link.deliver(&line(1.0)).await);
        let (first, _) = pipeline.accept().await.unwrap();
        assert_eq!(read_prices(first, 1).await, vec![1.0]);

        // pipeline goes down and comes back on the same port
        drop(pipeline);
        let pipeline = TcpListener::bind(&addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        for price in [2.0, 3.0, 4.0] {
            assert!(link.deliver(&line(price)).await);
        }
        let (second, _) = pipeline.accept().await.unwrap();
        assert_eq!(read_prices(second, 3).await, vec![2.0, 3.0, 4.0]);
    }

    #[tokio::test]
    async fn test_unreachable_pipeline_drops_confirmation() {
        let addr = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().to_string()
        };
        let mut link = ConfirmLink::new(test_config(addr));
        assert!(!link.deliver(&line(1.0)).await);
    }
}
