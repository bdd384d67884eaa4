//! Player notifications.
//!
//! Every state change of the [`Player`](crate::Player) is announced as a
//! [`PlayerEvent`]. Subscribers register a callback on the [`EventBus`],
//! either for all events or for a single [`EventKind`], and are invoked
//! synchronously on the thread that caused the change. Render-path events
//! (`SamplesPlayed`, `PositionChanged`, `TrackEnded`) therefore arrive on the
//! audio thread.
//!
//! Callbacks run while the player lock is held. A callback that needs to act
//! on the player must hand the work to another thread (a channel works well);
//! calling back into the player from inside a callback deadlocks.

use crate::error::PlayerError;
use crate::metadata::Metadata;
use crate::playlist::PlaylistKind;

/// A player notification. Borrowed payloads are valid for the duration of
/// the callback only.
#[derive(Debug, Clone, Copy)]
pub enum PlayerEvent<'a> {
    /// A file was loaded; payload is its position in the file playlist.
    FileChanged(usize),
    /// A track was selected.
    TrackChanged {
        /// Position in the track playlist.
        index: usize,
        /// Metadata of the selected track.
        metadata: &'a Metadata,
    },
    /// Playback position in milliseconds.
    PositionChanged(u64),
    /// The decoder reported the end of the current track.
    TrackEnded,
    /// Playback was paused.
    Paused,
    /// Playback started or resumed.
    Played,
    /// Playback stopped, either on request or after the last track.
    Stopped,
    /// A seek completed; payload is the new position in milliseconds.
    Seeked(u64),
    /// New master volume.
    VolumeChanged(u8),
    /// New tempo multiplier.
    TempoChanged(f64),
    /// New fade-out length in milliseconds.
    FadeChanged(u64),
    /// Repeat flags after a change.
    RepeatChanged {
        /// File playlist repeat.
        file: bool,
        /// Track playlist repeat.
        track: bool,
    },
    /// A playlist was shuffled.
    Shuffled(PlaylistKind),
    /// A command or the render path failed.
    Error(&'a PlayerError),
    /// Everything was unloaded.
    Cleared,
    /// Entries were added to, moved in or removed from a playlist.
    PlaylistChanged(PlaylistKind),
    /// A file was removed; payload is its former position.
    FileRemoved(usize),
    /// One decoded block, emitted when it starts playing.
    SamplesPlayed {
        /// Interleaved stereo block as decoded, before master volume.
        samples: &'a [f32],
        /// Mono downmix in `[-1, 1]` before master volume.
        visualization: &'a [f32],
    },
    /// A channel volume changed. Muting reports 0, unmuting the stored value.
    ChannelVolumeChanged {
        /// Channel index.
        index: usize,
        /// Effective volume, `0..=128`.
        value: u8,
    },
}

/// Discriminant of a [`PlayerEvent`], used for filtered subscriptions.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    FileChanged,
    TrackChanged,
    PositionChanged,
    TrackEnded,
    Paused,
    Played,
    Stopped,
    Seeked,
    VolumeChanged,
    TempoChanged,
    FadeChanged,
    RepeatChanged,
    Shuffled,
    Error,
    Cleared,
    PlaylistChanged,
    FileRemoved,
    SamplesPlayed,
    ChannelVolumeChanged,
}

impl PlayerEvent<'_> {
    /// Kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::FileChanged(_) => EventKind::FileChanged,
            Self::TrackChanged { .. } => EventKind::TrackChanged,
            Self::PositionChanged(_) => EventKind::PositionChanged,
            Self::TrackEnded => EventKind::TrackEnded,
            Self::Paused => EventKind::Paused,
            Self::Played => EventKind::Played,
            Self::Stopped => EventKind::Stopped,
            Self::Seeked(_) => EventKind::Seeked,
            Self::VolumeChanged(_) => EventKind::VolumeChanged,
            Self::TempoChanged(_) => EventKind::TempoChanged,
            Self::FadeChanged(_) => EventKind::FadeChanged,
            Self::RepeatChanged { .. } => EventKind::RepeatChanged,
            Self::Shuffled(_) => EventKind::Shuffled,
            Self::Error(_) => EventKind::Error,
            Self::Cleared => EventKind::Cleared,
            Self::PlaylistChanged(_) => EventKind::PlaylistChanged,
            Self::FileRemoved(_) => EventKind::FileRemoved,
            Self::SamplesPlayed { .. } => EventKind::SamplesPlayed,
            Self::ChannelVolumeChanged { .. } => EventKind::ChannelVolumeChanged,
        }
    }
}

/// Handle returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(&PlayerEvent<'_>) + Send>;

struct Subscriber {
    id: SubscriptionId,
    filter: Option<EventKind>,
    callback: Callback,
}

/// Ordered list of subscribers. Callbacks fire in subscription order.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

impl EventBus {
    /// Create a bus without subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every event.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&PlayerEvent<'_>) + Send + 'static,
    {
        self.insert(None, Box::new(callback))
    }

    /// Subscribe to events of one kind.
    pub fn on<F>(&mut self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: FnMut(&PlayerEvent<'_>) + Send + 'static,
    {
        self.insert(Some(kind), Box::new(callback))
    }

    fn insert(&mut self, filter: Option<EventKind>, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push(Subscriber {
            id,
            filter,
            callback,
        });
        id
    }

    /// Remove a subscriber. Returns `false` if the id was unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        self.subscribers.len() != before
    }

    /// Deliver an event to every matching subscriber.
    pub fn emit(&mut self, event: &PlayerEvent<'_>) {
        let kind = event.kind();
        for sub in &mut self.subscribers {
            if sub.filter.map_or(true, |f| f == kind) {
                (sub.callback)(event);
            }
        }
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
