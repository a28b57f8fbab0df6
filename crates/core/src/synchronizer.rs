//! Live local mirror of one program account.
//!
//! A [`Synchronizer`] fetches and decodes the account once, then follows the
//! ledger's push notifications in a background task. Every notification is
//! decoded and published on a `watch` channel (last write wins); readers pull
//! the latest snapshot with [`Synchronizer::latest`].

use std::sync::Arc;

use futures::StreamExt;
use solana_sdk::pubkey::Pubkey;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::codec::ProgramAccount;
use crate::error::{DecodeError, LiquidatorError, Result};
use crate::ports::Ledger;

type Snapshot<T> = std::result::Result<T, DecodeError>;

pub struct Synchronizer<T: ProgramAccount + Clone> {
    address: Pubkey,
    sender: Arc<watch::Sender<Snapshot<T>>>,
    receiver: watch::Receiver<Snapshot<T>>,
    task: JoinHandle<()>,
}

impl<T: ProgramAccount + Clone> Synchronizer<T> {
    /// Fetch `address`, decode it and start following it.
    pub async fn build(ledger: &Arc<dyn Ledger>, address: Pubkey) -> Result<Self> {
        let initial = fetch::<T>(ledger.as_ref(), &address).await?;
        Self::with_initial(ledger, address, initial).await
    }

    /// Start following `address` from an already decoded value.
    pub async fn with_initial(ledger: &Arc<dyn Ledger>, address: Pubkey, initial: T) -> Result<Self> {
        let mut updates = ledger.subscribe(&address).await?;
        let (sender, receiver) = watch::channel(Ok(initial));
        let sender = Arc::new(sender);

        let publisher = Arc::clone(&sender);
        let task = tokio::spawn(async move {
            while let Some(data) = updates.next().await {
                let snapshot = T::decode(&data);
                if let Err(e) = &snapshot {
                    error!(%address, schema = ?T::SCHEMA, error = %e, "Undecodable account update");
                }
                publisher.send_replace(snapshot);
            }
            debug!(%address, "Account subscription ended");
        });

        Ok(Self {
            address,
            sender,
            receiver,
            task,
        })
    }

    pub fn address(&self) -> Pubkey {
        self.address
    }

    /// The most recent snapshot. An update that failed to decode is
    /// reported here as a fatal [`LiquidatorError::Decode`].
    pub fn latest(&self) -> Result<T> {
        match &*self.receiver.borrow() {
            Ok(value) => Ok(value.clone()),
            Err(e) => Err(LiquidatorError::Decode(e.clone())),
        }
    }

    /// Re-read the account directly and publish it, without waiting for the
    /// next notification.
    pub async fn refresh(&self, ledger: &dyn Ledger) -> Result<T> {
        let value = fetch::<T>(ledger, &self.address).await?;
        self.sender.send_replace(Ok(value.clone()));
        Ok(value)
    }

    /// Wait until a newer snapshot is published.
    pub async fn changed(&mut self) -> Result<()> {
        self.receiver
            .changed()
            .await
            .map_err(|_| anyhow::anyhow!("synchronizer for {} closed", self.address))?;
        Ok(())
    }
}

impl<T: ProgramAccount + Clone> Drop for Synchronizer<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Fetch and decode one account.
pub async fn fetch<T: ProgramAccount>(ledger: &dyn Ledger, address: &Pubkey) -> Result<T> {
    let data = ledger
        .account_data(address)
        .await?
        .ok_or(LiquidatorError::AccountNotFound(*address))?;
    Ok(T::decode(&data)?)
}
