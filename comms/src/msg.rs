use std::io;

use crate::{
    Deserialize, Serialize,
    protocol::{self, HEADER_SIZE, Header},
};

/// The payload data for the `Data` variant of the `Msg` enum.
#[derive(Debug)]
pub enum Payload<'a> {
    /// A worker's local gradient, sent to the root of the group.
    Gradient(&'a [f32]),
    /// The group mean of every worker's gradient, sent back by the root.
    Reduced(&'a [f32]),
    /// The root's parameters, broadcast to every other worker.
    Params(&'a [f32]),
}

/// The command for the `Control` variant of the `Msg` enum.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// First frame sent by every non-root rank.
    Join { rank: usize, world_size: usize },
    /// The root's answer once every rank has joined.
    Welcome { world_size: usize },
    Barrier,
    Disconnect,
}

/// The application layer message of the process group.
#[derive(Debug)]
pub enum Msg<'a> {
    Control(Command),
    Data(Payload<'a>),
}

impl Msg<'_> {
    /// A short name for the message kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Msg::Control(_) => "control",
            Msg::Data(Payload::Gradient(_)) => "data/gradient",
            Msg::Data(Payload::Reduced(_)) => "data/reduced",
            Msg::Data(Payload::Params(_)) => "data/params",
        }
    }

    fn buf_is_too_small<T>(size: usize) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("The given buffer is too small {size}, must at least be {HEADER_SIZE} bytes"),
        ))
    }

    fn invalid_header<T>(header: Header) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Received an invalid header {header:?}"),
        ))
    }
}

impl<'a> Serialize<'a> for Msg<'a> {
    fn serialize(&'a self, buf: &mut Vec<u8>) -> io::Result<Option<&'a [u8]>> {
        match self {
            Msg::Control(cmd) => {
                buf.extend_from_slice(&protocol::CONTROL);
                serde_json::to_writer(buf, cmd)?;
                Ok(None)
            }
            Msg::Data(payload) => {
                let (header, nums) = match payload {
                    Payload::Gradient(nums) => (protocol::GRAD, nums),
                    Payload::Reduced(nums) => (protocol::REDUCED, nums),
                    Payload::Params(nums) => (protocol::PARAMS, nums),
                };

                buf.extend_from_slice(&header);
                Ok(Some(bytemuck::cast_slice(nums)))
            }
        }
    }
}

impl<'a> Deserialize<'a> for Msg<'a> {
    fn deserialize(buf: &'a mut [u8]) -> io::Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Self::buf_is_too_small(buf.len());
        }

        let (header, body) = buf.split_at_mut(HEADER_SIZE);
        let header = Header::try_from(&*header)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let body: &'a [u8] = body;

        match header {
            protocol::CONTROL => {
                let cmd = serde_json::from_slice(body)?;
                Ok(Self::Control(cmd))
            }
            protocol::GRAD | protocol::REDUCED | protocol::PARAMS => {
                let nums: &[f32] = bytemuck::try_cast_slice(body)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("{e:?}")))?;

                let payload = match header {
                    protocol::GRAD => Payload::Gradient(nums),
                    protocol::REDUCED => Payload::Reduced(nums),
                    _ => Payload::Params(nums),
                };

                Ok(Self::Data(payload))
            }
            other => Self::invalid_header(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(msg: &Msg<'_>) -> Vec<f32> {
        let mut buf = Vec::new();
        let tail = msg.serialize(&mut buf).unwrap();
        if let Some(tail) = tail {
            buf.extend_from_slice(tail);
        }

        // Receive into an f32 buffer, the same way `FrameReceiver` does.
        let mut aligned = vec![0f32; buf.len().div_ceil(4)];
        bytemuck::cast_slice_mut::<f32, u8>(aligned.as_mut_slice())[..buf.len()].copy_from_slice(&buf);
        aligned.truncate(buf.len() / 4);
        aligned
    }

    #[test]
    fn gradient_frames_keep_their_values() {
        let grad = [1.5, -2.0, 0.25];
        let mut raw = frame(&Msg::Data(Payload::Gradient(&grad)));

        match Msg::deserialize(bytemuck::cast_slice_mut(raw.as_mut_slice())).unwrap() {
            Msg::Data(Payload::Gradient(got)) => assert_eq!(got, grad),
            other => panic!("unexpected msg: {other:?}"),
        }
    }

    #[test]
    fn headers_distinguish_reduced_from_params() {
        let nums = [3.0];

        let mut raw = frame(&Msg::Data(Payload::Reduced(&nums)));
        let msg = Msg::deserialize(bytemuck::cast_slice_mut(raw.as_mut_slice())).unwrap();
        assert_eq!(msg.kind(), "data/reduced");

        let mut raw = frame(&Msg::Data(Payload::Params(&nums)));
        let msg = Msg::deserialize(bytemuck::cast_slice_mut(raw.as_mut_slice())).unwrap();
        assert_eq!(msg.kind(), "data/params");
    }

    #[test]
    fn short_buffers_are_rejected() {
        let mut buf = [0u8; 2];
        assert!(Msg::deserialize(&mut buf).is_err());
    }

    #[test]
    fn unknown_headers_are_rejected() {
        let mut buf = 99u32.to_be_bytes();
        assert!(Msg::deserialize(&mut buf).is_err());
    }
}
