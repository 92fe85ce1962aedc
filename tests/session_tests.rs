use clipmatch::{
    session::{Catalog, Fingerprinter, MediaItem, MediaLibrary, NoMatch, Recognizer, Signature},
    source::pcm::PcmSource,
    Error, PcmBuffer, Result, SourceFormat,
};
use std::{
    sync::{mpsc::RecvTimeoutError, Arc, Barrier, Mutex},
    time::Duration,
};

const TIMEOUT: Duration = Duration::from_secs(10);

/// Uses the clip's loudest sample as the whole signature.
struct PeakFingerprinter;

impl Fingerprinter for PeakFingerprinter {
    fn fingerprint(&mut self, clip: &PcmBuffer) -> Result<Signature> {
        if clip.is_empty() {
            return Err(Error::Fingerprint("empty clip".into()));
        }
        let peak = clip.samples().iter().fold(0.0f32, |m, s| m.max(s.abs()));
        Ok(Signature { data: vec![(peak * 100.0).round() as u8], duration: clip.duration() })
    }
}

/// Knows one song, identified by a peak of 0.5.
struct OneSongCatalog;

impl Catalog for OneSongCatalog {
    fn lookup(&self, signature: &Signature) -> Result<Vec<MediaItem>> {
        if signature.data == [50] {
            Ok(vec![MediaItem {
                title: Some("Half Volume".into()),
                artist: Some("The Peaks".into()),
                apple_music_url: Some("https://music.example/album/1".into()),
                artwork_url: Some("https://art.example/1.jpg".into()),
            }])
        } else {
            Ok(Vec::new())
        }
    }
}

struct FailingCatalog;

impl Catalog for FailingCatalog {
    fn lookup(&self, _: &Signature) -> Result<Vec<MediaItem>> {
        Err(Error::Catalog("service unavailable".into()))
    }
}

/// Holds every lookup until the test lets it through.
struct GatedCatalog {
    gate: Arc<Barrier>,
}

impl Catalog for GatedCatalog {
    fn lookup(&self, _: &Signature) -> Result<Vec<MediaItem>> {
        self.gate.wait();
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct RecordingLibrary {
    items: Mutex<Vec<MediaItem>>,
}

impl MediaLibrary for RecordingLibrary {
    fn add(&self, items: &[MediaItem]) -> Result<()> {
        self.items.lock().unwrap().extend_from_slice(items);
        Ok(())
    }
}

/// A tenth of a second of constant level, already in the target format.
fn clip(level: f32) -> PcmSource {
    PcmSource::from_fn(SourceFormat::float(44_100, 1), 4_410, |_, _| level)
}

#[test]
fn publishes_a_match() {
    let (mut recognizer, outcomes) = Recognizer::new(PeakFingerprinter, Arc::new(OneSongCatalog));
    recognizer.set_saves_to_library(false);

    assert!(recognizer.start_matching(&mut clip(0.5)));

    let song = outcomes.recv_timeout(TIMEOUT).unwrap().unwrap();
    assert_eq!(song.title.as_deref(), Some("Half Volume"));
    assert_eq!(song.artist.as_deref(), Some("The Peaks"));
    assert!(!recognizer.is_matching());
}

#[test]
fn publishes_no_match() {
    let (mut recognizer, outcomes) = Recognizer::new(PeakFingerprinter, Arc::new(OneSongCatalog));
    assert!(recognizer.start_matching(&mut clip(0.1)));
    assert_eq!(outcomes.recv_timeout(TIMEOUT).unwrap(), Err(NoMatch::default()));
}

#[test]
fn catalog_errors_become_no_match() {
    let (mut recognizer, outcomes) = Recognizer::new(PeakFingerprinter, Arc::new(FailingCatalog));
    assert!(recognizer.start_matching(&mut clip(0.1)));
    let no_match = outcomes.recv_timeout(TIMEOUT).unwrap().unwrap_err();
    assert!(no_match.error.unwrap().contains("service unavailable"));
}

#[test]
fn empty_clip_starts_nothing() {
    let (mut recognizer, outcomes) = Recognizer::new(PeakFingerprinter, Arc::new(OneSongCatalog));
    let mut empty = PcmSource::new(SourceFormat::float(44_100, 1), Vec::new());

    assert!(!recognizer.start_matching(&mut empty));
    assert!(!recognizer.is_matching());
    assert_eq!(outcomes.recv_timeout(Duration::from_millis(100)), Err(RecvTimeoutError::Timeout));
}

#[test]
fn one_match_at_a_time() {
    let gate = Arc::new(Barrier::new(2));
    let catalog = GatedCatalog { gate: Arc::clone(&gate) };
    let (mut recognizer, outcomes) = Recognizer::new(PeakFingerprinter, Arc::new(catalog));

    assert!(recognizer.start_matching(&mut clip(0.3)));
    assert!(recognizer.is_matching());
    assert!(matches!(recognizer.try_start_matching(&mut clip(0.3)), Err(Error::AlreadyMatching)));

    gate.wait();
    assert!(outcomes.recv_timeout(TIMEOUT).unwrap().is_err());
    assert!(!recognizer.is_matching());
    assert_eq!(outcomes.recv_timeout(Duration::from_millis(100)), Err(RecvTimeoutError::Timeout));
}

#[test]
fn saves_matches_only_when_asked() {
    let library = Arc::new(RecordingLibrary::default());
    let (recognizer, outcomes) = Recognizer::new(PeakFingerprinter, Arc::new(OneSongCatalog));
    let mut recognizer = recognizer.with_library(library.clone());

    assert!(recognizer.start_matching(&mut clip(0.5)));
    assert!(outcomes.recv_timeout(TIMEOUT).unwrap().is_ok());
    assert!(library.items.lock().unwrap().is_empty());

    recognizer.set_saves_to_library(true);
    assert!(recognizer.start_matching(&mut clip(0.5)));
    assert!(outcomes.recv_timeout(TIMEOUT).unwrap().is_ok());
    let saved = library.items.lock().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].title.as_deref(), Some("Half Volume"));
}
