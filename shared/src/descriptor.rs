//! Shareable join links

use crate::model::{PeerId, RoomId, Session};
use std::str::FromStr;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("invalid join link: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("join link is missing the `{0}` parameter")]
    MissingParameter(&'static str),
}

/// What a new peer needs to find a room: the room id and the host to dial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinDescriptor {
    pub room_id: RoomId,
    pub host_peer_id: PeerId,
}

impl JoinDescriptor {
    /// Renders the descriptor as `<base_url>?room=<roomId>&host=<hostPeerId>`.
    pub fn to_link(&self, base_url: &str) -> Result<String, DescriptorError> {
        let mut url = Url::parse(base_url)?;
        url.query_pairs_mut()
            .clear()
            .append_pair("room", self.room_id.as_str())
            .append_pair("host", self.host_peer_id.as_str());
        Ok(url.into())
    }

    pub fn parse(link: &str) -> Result<Self, DescriptorError> {
        let url = Url::parse(link.trim())?;
        let mut room = None;
        let mut host = None;

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "room" if !value.is_empty() => room = Some(RoomId::new(value.into_owned())),
                "host" if !value.is_empty() => host = Some(PeerId::new(value.into_owned())),
                _ => {}
            }
        }

        Ok(Self {
            room_id: room.ok_or(DescriptorError::MissingParameter("room"))?,
            host_peer_id: host.ok_or(DescriptorError::MissingParameter("host"))?,
        })
    }
}

impl FromStr for JoinDescriptor {
    type Err = DescriptorError;

    fn from_str(link: &str) -> Result<Self, Self::Err> {
        Self::parse(link)
    }
}

impl From<&Session> for JoinDescriptor {
    fn from(session: &Session) -> Self {
        Self {
            room_id: session.room_id.clone(),
            host_peer_id: session.host_peer_id.clone(),
        }
    }
}

impl From<JoinDescriptor> for Session {
    fn from(descriptor: JoinDescriptor) -> Self {
        Self {
            room_id: descriptor.room_id,
            host_peer_id: descriptor.host_peer_id,
        }
    }
}
