/// Time-bounded player input.
///
/// The resolver asks an [`ActionSource`] for one action per round with a
/// deadline. `None` means the deadline passed and the round becomes a stun.
use crossbeam_channel::{after, select, unbounded, Receiver, Sender};
use log::debug;
use std::collections::VecDeque;
use std::time::Duration;

use crate::schema::action::PlayerAction;
use crate::schema::pattern::Pattern;

/// What the player sees when asked to act.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnView {
    pub round: u32,
    pub health: u32,
    pub max_health: u32,
    pub stamina: u32,
    pub max_stamina: u32,
    pub enemy_name: String,
    pub enemy_health: u32,
    pub enemy_max_health: u32,
    /// The enemy action already chosen for this round.
    pub preview: Pattern,
    /// 0 for regular enemies, 1.. for bosses.
    pub boss_phase: u8,
    /// Display order of the available actions; may be shuffled by distortion.
    pub choices: Vec<PlayerAction>,
}

pub trait ActionSource {
    /// Wait up to `limit` for the player's action.
    fn next_action(&mut self, view: &TurnView, limit: Duration) -> Option<PlayerAction>;
}

impl<F> ActionSource for F
where
    F: FnMut(&TurnView, Duration) -> Option<PlayerAction>,
{
    fn next_action(&mut self, view: &TurnView, limit: Duration) -> Option<PlayerAction> {
        self(view, limit)
    }
}

/// A fixed script of actions. `None` entries simulate a timed-out turn.
/// Once the script runs out, the fallback (if any) repeats forever.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    queue: VecDeque<Option<PlayerAction>>,
    fallback: Option<PlayerAction>,
}

impl ScriptedInput {
    pub fn new(actions: impl IntoIterator<Item = PlayerAction>) -> Self {
        Self {
            queue: actions.into_iter().map(Some).collect(),
            fallback: None,
        }
    }

    /// A script that may contain timeouts.
    pub fn with_timeouts(actions: impl IntoIterator<Item = Option<PlayerAction>>) -> Self {
        Self {
            queue: actions.into_iter().collect(),
            fallback: None,
        }
    }

    pub fn repeating(action: PlayerAction) -> Self {
        Self {
            queue: VecDeque::new(),
            fallback: Some(action),
        }
    }

    pub fn then(mut self, fallback: PlayerAction) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl ActionSource for ScriptedInput {
    fn next_action(&mut self, _view: &TurnView, _limit: Duration) -> Option<PlayerAction> {
        match self.queue.pop_front() {
            Some(entry) => entry,
            None => self.fallback,
        }
    }
}

/// Input arriving over a channel from another thread, raced against the
/// turn timer. The timer is abandoned as soon as input arrives.
///
/// Anything that arrives after a turn has timed out answered a view that is
/// gone; it is dropped when the next turn starts instead of being read as
/// that turn's action.
#[derive(Debug)]
pub struct ChannelInput {
    actions: Receiver<PlayerAction>,
    views: Option<Sender<TurnView>>,
    timed_out: bool,
}

impl ChannelInput {
    pub fn new(actions: Receiver<PlayerAction>) -> Self {
        Self {
            actions,
            views: None,
            timed_out: false,
        }
    }

    /// Also publish each turn's view so a front end can render it.
    pub fn with_views(mut self, views: Sender<TurnView>) -> Self {
        self.views = Some(views);
        self
    }
}

impl ActionSource for ChannelInput {
    fn next_action(&mut self, view: &TurnView, limit: Duration) -> Option<PlayerAction> {
        if std::mem::take(&mut self.timed_out) {
            let stale = self.actions.try_iter().count();
            if stale > 0 {
                debug!("dropped {} late action(s) before round {}", stale, view.round);
            }
        }
        if let Some(views) = &self.views {
            // A front end that went away just stops getting views.
            let _ = views.send(view.clone());
        }
        let action = select! {
            recv(self.actions) -> msg => msg.ok(),
            recv(after(limit)) -> _ => None,
        };
        self.timed_out = action.is_none();
        action
    }
}

/// A sender for the front end and the matching input source.
pub fn channel() -> (Sender<PlayerAction>, ChannelInput) {
    let (tx, rx) = unbounded();
    (tx, ChannelInput::new(rx))
}
