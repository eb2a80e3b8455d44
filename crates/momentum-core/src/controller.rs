//! Host-side session controller.
//!
//! Owns one [`SessionEngine`], the session log it persists into, and the
//! single tick source driving it. Every event the engine produces is
//! published to subscribers.

use tokio::sync::{broadcast, mpsc};
use tracing::warn;

use crate::error::Result;
use crate::events::Event;
use crate::reflection::ReflectionField;
use crate::storage::{KvStore, SessionLog, SessionRecord};
use crate::timer::{EngineConfig, SessionEngine, SessionSnapshot, Ticker, TICK_INTERVAL};

const EVENT_CAPACITY: usize = 64;

pub struct SessionController<S> {
    engine: SessionEngine,
    log: SessionLog<S>,
    ticker: Ticker,
    tick_tx: mpsc::UnboundedSender<()>,
    tick_rx: mpsc::UnboundedReceiver<()>,
    events: broadcast::Sender<Event>,
}

impl<S: KvStore> SessionController<S> {
    pub fn new(config: EngineConfig, store: S) -> Self {
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            engine: SessionEngine::new(config),
            log: SessionLog::new(store),
            ticker: Ticker::new(),
            tick_tx,
            tick_rx,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.engine.snapshot()
    }

    pub fn engine(&self) -> &SessionEngine {
        &self.engine
    }

    pub fn history(&self) -> Vec<SessionRecord> {
        self.log.read()
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.is_active()
    }

    /// Start a session and (re)start the one-second ticker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_session(&mut self) -> Option<Event> {
        let event = self.engine.start_session()?;
        self.drain_pending_ticks();
        self.ticker.start(TICK_INTERVAL, self.tick_tx.clone());
        Some(self.publish(event))
    }

    pub fn stop_session(&mut self) -> Option<Event> {
        let event = self.engine.stop_session()?;
        self.ticker.stop();
        self.drain_pending_ticks();
        Some(self.publish(event))
    }

    pub fn tick(&mut self) -> Option<Event> {
        let event = self.engine.tick()?;
        Some(self.publish(event))
    }

    pub fn dismiss_prompt(&mut self) -> Option<Event> {
        let event = self.engine.dismiss_prompt()?;
        Some(self.publish(event))
    }

    pub fn set_reflection_field(&mut self, field: ReflectionField) -> Option<Event> {
        let event = self.engine.set_reflection_field(field)?;
        Some(self.publish(event))
    }

    /// # Errors
    ///
    /// Propagates session log write failures; the session stays in
    /// Reflection.
    pub fn finish_reflection(&mut self) -> Result<Option<Event>> {
        match self.engine.finish_reflection(&self.log)? {
            Some(event) => Ok(Some(self.publish(event))),
            None => Ok(None),
        }
    }

    /// Wait for the next tick from the ticker.
    ///
    /// Pending forever while no session is running.
    pub async fn next_tick(&mut self) {
        // The controller holds a sender, so the channel never closes.
        if self.tick_rx.recv().await.is_none() {
            warn!("tick channel closed");
            std::future::pending::<()>().await;
        }
    }

    fn drain_pending_ticks(&mut self) {
        while self.tick_rx.try_recv().is_ok() {}
    }

    fn publish(&self, event: Event) -> Event {
        // No subscribers is not an error.
        let _ = self.events.send(event.clone());
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflection::{Meaningful, Perfectionism};
    use crate::storage::MemoryStore;
    use crate::timer::SessionPhase;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn ticker_drives_activation_into_focus() {
        let mut controller =
            SessionController::new(EngineConfig::new(3).unwrap(), MemoryStore::new());
        let mut events = controller.subscribe();

        controller.start_session().unwrap();
        assert!(controller.is_ticking());
        for _ in 0..3 {
            controller.next_tick().await;
            controller.tick();
        }
        assert_eq!(controller.snapshot().phase, SessionPhase::Focus);

        assert!(matches!(events.recv().await.unwrap(), Event::SessionStarted { activation_secs: 3, .. }));
        assert!(matches!(events.recv().await.unwrap(), Event::FocusStarted { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_ticker_and_finish_persists() {
        let mut controller = SessionController::new(EngineConfig::default(), MemoryStore::new());
        controller.start_session().unwrap();
        for _ in 0..5 {
            controller.next_tick().await;
            controller.tick();
        }
        controller.stop_session().unwrap();
        assert!(!controller.is_ticking());

        let waited = tokio::time::timeout(Duration::from_secs(3), controller.next_tick()).await;
        assert!(waited.is_err());

        controller.set_reflection_field(ReflectionField::Meaningful(Meaningful::No));
        controller.set_reflection_field(ReflectionField::Perfectionism(Perfectionism::Yes));
        let finished = controller.finish_reflection().unwrap();
        assert!(matches!(finished, Some(Event::SessionFinished { total_sessions: 1, .. })));

        let history = controller.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].activation_used_secs, 5);
        assert_eq!(controller.snapshot().phase, SessionPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_intents_publish_nothing() {
        let mut controller = SessionController::new(EngineConfig::default(), MemoryStore::new());
        let mut events = controller.subscribe();
        assert!(controller.stop_session().is_none());
        assert!(controller.dismiss_prompt().is_none());
        assert!(controller.finish_reflection().unwrap().is_none());
        assert!(events.try_recv().is_err());
    }
}
