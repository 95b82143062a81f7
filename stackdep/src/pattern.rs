use std::io::{BufRead, Write};

use failure::{Fail, Fallible};
use serde_derive::{Deserialize, Serialize};

/// Pattern errors.
#[derive(Clone, Debug, Eq, Fail, PartialEq)]
pub enum PatternError {
    #[fail(
        display = "pattern {} has input length {}, expected {}",
        index, found, expected
    )]
    InputLength {
        index: usize,
        found: usize,
        expected: usize,
    },

    #[fail(
        display = "pattern {} has output length {}, expected {}",
        index, found, expected
    )]
    OutputLength {
        index: usize,
        found: usize,
        expected: usize,
    },

    #[fail(display = "cannot parse pattern on line {}: {}", line, message)]
    Syntax { line: usize, message: String },
}

/// A training example: the feature vector of a parser state and the
/// one-hot encoded gold action.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Pattern {
    pub input: Vec<f32>,
    pub output: Vec<f32>,
}

impl Pattern {
    pub fn new(input: Vec<f32>, output: Vec<f32>) -> Self {
        Pattern { input, output }
    }
}

/// Data types that collect (and typically store) patterns.
pub trait Collector {
    fn collect(&mut self, pattern: Pattern) -> Fallible<()>;

    /// The number of patterns collected so far.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Collector that only counts patterns.
#[derive(Debug, Default)]
pub struct NoopCollector {
    n_patterns: usize,
}

impl Collector for NoopCollector {
    fn collect(&mut self, _pattern: Pattern) -> Fallible<()> {
        self.n_patterns += 1;
        Ok(())
    }

    fn len(&self) -> usize {
        self.n_patterns
    }
}

/// Patterns with the same input and output lengths.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    pub fn new() -> Self {
        PatternSet::default()
    }

    /// Add a pattern.
    ///
    /// Fails when the lengths of the pattern differ from the lengths of
    /// the first pattern in the set.
    pub fn push(&mut self, pattern: Pattern) -> Result<(), PatternError> {
        if let Some(first) = self.patterns.first() {
            check_lengths(first, &pattern, self.patterns.len())?;
        }

        self.patterns.push(pattern);

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }

    /// Input length, `None` for an empty set.
    pub fn input_len(&self) -> Option<usize> {
        self.patterns.first().map(|pattern| pattern.input.len())
    }

    /// Output length, `None` for an empty set.
    pub fn output_len(&self) -> Option<usize> {
        self.patterns.first().map(|pattern| pattern.output.len())
    }

    /// Read a pattern set written by `PatternWriter`.
    pub fn from_json_read<R>(read: R) -> Fallible<Self>
    where
        R: BufRead,
    {
        let mut set = PatternSet::new();
        for pattern in PatternReader::new(read) {
            set.push(pattern?)?;
        }
        Ok(set)
    }

    /// Write the pattern set as a JSON array, one pattern per line.
    pub fn to_json_write<W>(&self, write: W) -> Fallible<()>
    where
        W: Write,
    {
        let mut writer = PatternWriter::new(write)?;
        for pattern in &self.patterns {
            writer.collect(pattern.clone())?;
        }
        writer.finish()?;

        Ok(())
    }
}

impl Collector for PatternSet {
    fn collect(&mut self, pattern: Pattern) -> Fallible<()> {
        self.push(pattern)?;
        Ok(())
    }

    fn len(&self) -> usize {
        self.patterns.len()
    }
}

fn check_lengths(first: &Pattern, pattern: &Pattern, index: usize) -> Result<(), PatternError> {
    if pattern.input.len() != first.input.len() {
        return Err(PatternError::InputLength {
            index,
            found: pattern.input.len(),
            expected: first.input.len(),
        });
    }

    if pattern.output.len() != first.output.len() {
        return Err(PatternError::OutputLength {
            index,
            found: pattern.output.len(),
            expected: first.output.len(),
        });
    }

    Ok(())
}

/// Incremental writer of pattern sets.
///
/// Patterns are written as a JSON array with one pattern per line, so
/// that large sets never have to be kept in memory. The array is closed
/// by `finish`.
pub struct PatternWriter<W>
where
    W: Write,
{
    write: W,
    first: Option<Pattern>,
    n_patterns: usize,
}

impl<W> PatternWriter<W>
where
    W: Write,
{
    pub fn new(mut write: W) -> Fallible<Self> {
        write.write_all(b"[\n")?;

        Ok(PatternWriter {
            write,
            first: None,
            n_patterns: 0,
        })
    }

    /// Close the array and return the underlying writer.
    pub fn finish(mut self) -> Fallible<W> {
        self.write.write_all(b"\n]\n")?;
        self.write.flush()?;
        Ok(self.write)
    }
}

impl<W> Collector for PatternWriter<W>
where
    W: Write,
{
    fn collect(&mut self, pattern: Pattern) -> Fallible<()> {
        match self.first {
            Some(ref first) => {
                check_lengths(first, &pattern, self.n_patterns)?;
                self.write.write_all(b",\n")?;
            }
            None => self.first = Some(pattern.clone()),
        }

        serde_json::to_writer(&mut self.write, &pattern)?;
        self.n_patterns += 1;

        Ok(())
    }

    fn len(&self) -> usize {
        self.n_patterns
    }
}

/// Streaming reader of pattern sets.
///
/// The reader expects the layout of `PatternWriter`: the brackets of
/// the array on their own lines and one pattern per line.
pub struct PatternReader<R> {
    read: R,
    line: usize,
    buf: String,
}

impl<R> PatternReader<R>
where
    R: BufRead,
{
    pub fn new(read: R) -> Self {
        PatternReader {
            read,
            line: 0,
            buf: String::new(),
        }
    }
}

impl<R> Iterator for PatternReader<R>
where
    R: BufRead,
{
    type Item = Fallible<Pattern>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.read.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => (),
                Err(err) => return Some(Err(err.into())),
            }
            self.line += 1;

            let record = self.buf.trim();
            if record.is_empty() || record == "[" || record == "]" {
                continue;
            }

            let line = self.line;
            let record = record.trim_end_matches(',');
            return Some(serde_json::from_str(record).map_err(|err| {
                PatternError::Syntax {
                    line,
                    message: err.to_string(),
                }
                .into()
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::{Collector, NoopCollector, Pattern, PatternError, PatternSet, PatternWriter};

    fn patterns() -> Vec<Pattern> {
        vec![
            Pattern::new(vec![0.25, 1., 0.], vec![1., 0., 0.]),
            Pattern::new(vec![0.5, 0., 1.], vec![0., 0., 1.]),
        ]
    }

    #[test]
    fn writer_layout() {
        let mut writer = PatternWriter::new(Vec::new()).unwrap();
        for pattern in patterns() {
            writer.collect(pattern).unwrap();
        }
        assert_eq!(writer.len(), 2);

        let data = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert_eq!(
            data,
            "[\n{\"input\":[0.25,1.0,0.0],\"output\":[1.0,0.0,0.0]},\n\
             {\"input\":[0.5,0.0,1.0],\"output\":[0.0,0.0,1.0]}\n]\n"
        );
    }

    #[test]
    fn read_written_patterns() {
        let mut set = PatternSet::new();
        for pattern in patterns() {
            set.push(pattern).unwrap();
        }

        let mut data = Vec::new();
        set.to_json_write(&mut data).unwrap();
        let read = PatternSet::from_json_read(Cursor::new(data)).unwrap();

        assert_eq!(read, set);
        assert_eq!(read.input_len(), Some(3));
        assert_eq!(read.output_len(), Some(3));
    }

    #[test]
    fn empty_set() {
        let mut data = Vec::new();
        PatternSet::new().to_json_write(&mut data).unwrap();
        let read = PatternSet::from_json_read(Cursor::new(data)).unwrap();
        assert!(read.is_empty());
        assert_eq!(read.input_len(), None);
    }

    #[test]
    fn lengths_must_agree() {
        let mut set = PatternSet::new();
        set.push(Pattern::new(vec![0.; 3], vec![1., 0., 0.])).unwrap();
        assert_eq!(
            set.push(Pattern::new(vec![0.; 4], vec![1., 0., 0.])),
            Err(PatternError::InputLength {
                index: 1,
                found: 4,
                expected: 3
            })
        );
        assert_eq!(
            set.push(Pattern::new(vec![0.; 3], vec![1., 0.])),
            Err(PatternError::OutputLength {
                index: 1,
                found: 2,
                expected: 3
            })
        );
    }

    #[test]
    fn missing_output_is_rejected() {
        let data = "[\n{\"input\":[0.5,1.0]},\n]\n";
        let err = PatternSet::from_json_read(Cursor::new(data)).unwrap_err();
        match err.downcast::<PatternError>() {
            Ok(PatternError::Syntax { line: 2, .. }) => (),
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn noop_collector_counts() {
        let mut collector = NoopCollector::default();
        for pattern in patterns() {
            collector.collect(pattern).unwrap();
        }
        assert_eq!(collector.len(), 2);
    }
}
