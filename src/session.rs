//! Recognition round trip: convert a clip, fingerprint it, look the fingerprint up, publish the outcome.
//!
//! Fingerprinting, catalog lookup and library persistence are supplied by the caller. Outcomes are
//! delivered over a channel; whoever holds the [`Receiver`] decides which thread handles them.

use crate::{convert_with, AudioSource, ConverterSettings, Error, FormatDescriptor, PcmBuffer, Result};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, Sender},
        Arc,
    },
    thread,
    time::Duration,
};
use tracing::{debug, error, info, warn};

/// Compact description of a clip, produced by a [`Fingerprinter`] and understood by a [`Catalog`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub data: Vec<u8>,
    /// Length of audio the signature was generated from.
    pub duration: Duration,
}

/// A catalog entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MediaItem {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub apple_music_url: Option<String>,
    pub artwork_url: Option<String>,
}

/// What gets published when a catalog lookup finds something.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SongMatch {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub apple_music_url: Option<String>,
    pub artwork_url: Option<String>,
}

impl From<&MediaItem> for SongMatch {
    fn from(item: &MediaItem) -> Self {
        Self {
            title: item.title.clone(),
            artist: item.artist.clone(),
            apple_music_url: item.apple_music_url.clone(),
            artwork_url: item.artwork_url.clone(),
        }
    }
}

/// The lookup finished without a match. `error` is set if the lookup itself failed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NoMatch {
    pub error: Option<String>,
}

pub type MatchOutcome = std::result::Result<SongMatch, NoMatch>;

/// Generates signatures from converted audio.
pub trait Fingerprinter {
    fn fingerprint(&mut self, clip: &PcmBuffer) -> Result<Signature>;
}

/// Matches signatures against a reference catalog.
pub trait Catalog: Send + Sync {
    /// Returns the catalog entries matching `signature`, best first. Empty means no match.
    fn lookup(&self, signature: &Signature) -> Result<Vec<MediaItem>>;
}

/// Somewhere matched items can be saved.
pub trait MediaLibrary: Send + Sync {
    fn add(&self, items: &[MediaItem]) -> Result<()>;
}

/// Drives clips through conversion, fingerprinting and lookup, one match at a time.
pub struct Recognizer<F> {
    fingerprinter: F,
    catalog: Arc<dyn Catalog>,
    library: Option<Arc<dyn MediaLibrary>>,
    target: FormatDescriptor,
    settings: ConverterSettings,
    saves_to_library: bool,
    is_matching: Arc<AtomicBool>,
    outcomes: Sender<MatchOutcome>,
}

impl<F: Fingerprinter> Recognizer<F> {
    /// Builds a recognizer and the receiving end of its outcome channel.
    pub fn new(fingerprinter: F, catalog: Arc<dyn Catalog>) -> (Self, Receiver<MatchOutcome>) {
        let (outcomes, receiver) = mpsc::channel();
        let recognizer = Self {
            fingerprinter,
            catalog,
            library: None,
            target: FormatDescriptor::default(),
            settings: ConverterSettings::default(),
            saves_to_library: false,
            is_matching: Arc::new(AtomicBool::new(false)),
            outcomes,
        };
        (recognizer, receiver)
    }

    /// Where matched items go when saving is turned on.
    pub fn with_library(mut self, library: Arc<dyn MediaLibrary>) -> Self {
        self.library = Some(library);
        self
    }

    pub fn with_target(mut self, target: FormatDescriptor) -> Self {
        self.target = target;
        self
    }

    pub fn with_settings(mut self, settings: ConverterSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn set_saves_to_library(&mut self, saves: bool) {
        self.saves_to_library = saves;
    }

    pub fn saves_to_library(&self) -> bool {
        self.saves_to_library
    }

    /// Whether a lookup is in flight.
    pub fn is_matching(&self) -> bool {
        self.is_matching.load(Ordering::SeqCst)
    }

    /// Converts and fingerprints `source`.
    pub fn signature<S: AudioSource>(&mut self, source: &mut S) -> Result<Signature> {
        let clip = convert_with(source, self.target, &self.settings)?;
        self.fingerprinter.fingerprint(&clip)
    }

    /// Starts matching `source`. The lookup runs on a background thread and exactly one
    /// outcome is sent once it finishes.
    ///
    /// Returns false, without sending anything, if a match is already in flight or no
    /// signature could be produced from `source`.
    pub fn start_matching<S: AudioSource>(&mut self, source: &mut S) -> bool {
        match self.try_start_matching(source) {
            Ok(()) => true,
            Err(e) => {
                debug!("not matching: {}", e);
                false
            }
        }
    }

    /// Like [`start_matching`](Self::start_matching), but says why nothing was started.
    pub fn try_start_matching<S: AudioSource>(&mut self, source: &mut S) -> Result<()> {
        if self.is_matching() {
            return Err(Error::AlreadyMatching);
        }
        let signature = self.signature(source)?;
        if self.is_matching.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyMatching);
        }

        let catalog = Arc::clone(&self.catalog);
        let library = if self.saves_to_library { self.library.clone() } else { None };
        let is_matching = Arc::clone(&self.is_matching);
        let outcomes = self.outcomes.clone();

        let spawned = thread::Builder::new().name("clipmatch-lookup".into()).spawn(move || {
            let outcome = lookup(&*catalog, library.as_deref(), &signature);
            is_matching.store(false, Ordering::SeqCst);
            if outcomes.send(outcome).is_err() {
                debug!("match outcome dropped, receiver is gone");
            }
        });

        if let Err(e) = spawned {
            self.is_matching.store(false, Ordering::SeqCst);
            return Err(Error::Catalog(format!("failed to start lookup thread: {}", e)));
        }
        Ok(())
    }
}

fn lookup(catalog: &dyn Catalog, library: Option<&dyn MediaLibrary>, signature: &Signature) -> MatchOutcome {
    let items = match catalog.lookup(signature) {
        Ok(items) => items,
        Err(e) => {
            error!("catalog lookup failed: {}", e);
            return Err(NoMatch { error: Some(e.to_string()) });
        }
    };

    let item = match items.first() {
        Some(item) => item,
        None => {
            info!("no match for {:?} signature", signature.duration);
            return Err(NoMatch::default());
        }
    };

    if let Some(library) = library {
        if let Err(e) = library.add(std::slice::from_ref(item)) {
            warn!("failed to save match to library: {}", e);
        }
    }

    Ok(SongMatch::from(item))
}
