use tokio::sync::watch;

/// Cloneable shutdown flag, any holder can trigger it and every holder can wait on it.
#[derive(Clone)]
pub struct Shutdown {
    sender: watch::Sender<bool>,
    receiver: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self { sender, receiver }
    }

    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    pub async fn recv(&mut self) {
        // Only errors if the sender is gone, which can't happen while we hold one.
        let _ = self.receiver.wait_for(|triggered| *triggered).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_clone_sees_the_trigger() {
        let shutdown = Shutdown::new();
        let mut first = shutdown.clone();
        let mut second = shutdown.clone();

        shutdown.trigger();
        first.recv().await;
        second.recv().await;

        // Waiting again after the fact returns straight away
        first.recv().await;
        second.recv().await;
    }
}
