use crossterm::event::KeyEvent;

use crate::insight::MarketInsight;

/// Everything the main loop reacts to arrives through one channel.
pub enum Event {
    Input(KeyEvent),
    Tick,
    Insight(MarketInsight),
}
