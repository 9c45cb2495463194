//! Song recognition (`songreco_*`).

use crate::client::CompanionClient;

/// Song recognition listeners.
#[derive(Debug, Clone, Copy)]
pub struct Media<'a> {
    client: &'a CompanionClient,
}

impl<'a> Media<'a> {
    pub(crate) fn new(client: &'a CompanionClient) -> Self {
        Self { client }
    }

    listener_methods! {
        /// Recognised song metadata.
        on_details => "songreco_details";
        on_lyric_compound => "songreco_lyric_compound";
        /// Full lyrics.
        on_lyrics => "songreco_lyrics";
        /// A single lyric line.
        on_lyric => "songreco_lyric";
    }
}
