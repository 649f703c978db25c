use tokio::sync::watch;

/// Resolves once the shutdown flag is raised.
///
/// A dropped sender counts as shutdown, so a worker never outlives the
/// component that owns the signal.
pub async fn cancelled(shutdown_rx: &mut watch::Receiver<bool>) {
    let _ = shutdown_rx.wait_for(|stop| *stop).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_resolves_on_signal() {
        let (tx, mut rx) = watch::channel(false);
        let waiter = tokio::spawn(async move { cancelled(&mut rx).await });
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_resolves_when_sender_dropped() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), cancelled(&mut rx))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_pending_while_running() {
        let (_tx, mut rx) = watch::channel(false);
        let result = tokio::time::timeout(Duration::from_millis(20), cancelled(&mut rx)).await;
        assert!(result.is_err());
    }
}
