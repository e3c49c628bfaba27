#![cfg(feature = "futures")]


pub mod nonblocking_tests {
    use futures::executor::block_on;
    use futures::io::Cursor;
    use futures::StreamExt;
    use pretty_assertions::assert_eq;

    use ebml_streaming::nonblocking::AsyncStreamParser;
    use ebml_streaming::ParseEvent;

    use super::test_schema::*;

    #[test]
    pub fn next_events_until_end() {
        let stream = sample_stream();
        let mut reader = AsyncStreamParser::new(Cursor::new(stream.clone()), parser());

        let mut events: Vec<ParseEvent> = Vec::new();
        block_on(async {
            while let Some(batch) = reader.next_events().await {
                events.extend(batch.expect("Cursor reads shouldn't fail"));
            }
        });

        assert!(!reader.parser().has_open_document());
        assert_eq!(stream.len() as u64, reader.parser().stream_offset());
        assert_eq!(final_events(&parse_in_chunks(&mut parser(), &stream, 4096)), final_events(&events));
    }

    #[test]
    pub fn as_stream() {
        let reader = AsyncStreamParser::new(Cursor::new(sample_stream()), parser());
        let batches: Vec<_> = block_on(reader.into_stream().collect());

        let events: Vec<ParseEvent> = batches.into_iter()
            .flat_map(|batch| batch.expect("Cursor reads shouldn't fail"))
            .collect();
        assert_eq!(2, documents(&events).len());
        assert_eq!(4, payloads(&events).len());
    }

    #[test]
    pub fn empty_source() {
        let mut reader = AsyncStreamParser::new(Cursor::new(Vec::new()), parser());
        let first = block_on(reader.next_events()).expect("First call should report the flush");
        assert!(first.expect("Cursor reads shouldn't fail").is_empty());
        assert!(block_on(reader.next_events()).is_none());
    }
}
