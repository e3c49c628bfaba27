use std::io;

use futures::{AsyncRead, AsyncReadExt, Stream};

use crate::events::ParseEvent;
use crate::parser::StreamParser;

const READ_CHUNK_LEN: usize = 1024 * 64;

///
/// Drives a [`StreamParser`] from an asynchronous byte source.
///
/// Each read from the source is fed to the parser as one chunk, and the events it produced are handed back.  When the source reaches end of file the parser is flushed, so the last batch carries the final [`ParseEvent::DocumentReady`].
///
/// This can be transformed into a [`Stream`] using [`into_stream`][AsyncStreamParser::into_stream], or consumed directly by calling [`.next_events().await`][AsyncStreamParser::next_events] in a loop.
///
pub struct AsyncStreamParser<R: AsyncRead + Unpin>
{
    source: R,
    buffer: Box<[u8]>,
    parser: StreamParser,
    finished: bool,
}

impl<R: AsyncRead + Unpin> AsyncStreamParser<R>
{
    pub fn new(source: R, parser: StreamParser) -> Self {
        let buffer = vec![0u8; READ_CHUNK_LEN];
        Self {
            source,
            buffer: buffer.into_boxed_slice(),
            parser,
            finished: false,
        }
    }

    pub fn parser(&self) -> &StreamParser {
        &self.parser
    }

    ///
    /// Reads the next chunk from the source and returns the events it produced.
    ///
    /// Returns `None` once the source has ended and the parser has been flushed.
    ///
    pub async fn next_events(&mut self) -> Option<Result<Vec<ParseEvent>, io::Error>> {
        if self.finished {
            return None;
        }

        match self.source.read(&mut self.buffer).await {
            Ok(0) => {
                self.finished = true;
                Some(Ok(self.parser.flush()))
            },
            Ok(len) => Some(Ok(self.parser.feed(&self.buffer[..len]))),
            Err(e) => Some(Err(e)),
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<ParseEvent>, io::Error>> {
        futures::stream::unfold(self, |mut read| async {
            let next = read.next_events().await;
            next.map(move |it| (it, read))
        })
    }
}
