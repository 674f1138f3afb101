//! The data set reader.
//!
//! Nested sequences are handled with an explicit stack of open
//! sequence and item frames, each bounded either by a defined length
//! or by a delimitation item.

use crate::decode::{decode_value, Mode, Source};
use crate::error::{
    ContainerOverrunSnafu, InvalidOffsetTableSnafu, Result, UnexpectedDelimiterSnafu,
    UnexpectedEndOfStreamSnafu, UndefinedValueLengthSnafu, UnexpectedItemTagSnafu,
};
use crate::text::SpecificCharacterSet;
use dicomview_core::dataset::{DataElement, DataSet};
use dicomview_core::header::{DataElementHeader, Tag, VR};
use dicomview_core::tags;
use dicomview_core::value::{Fragment, PixelFragments, Value};
use snafu::{ensure, OptionExt};
use tracing::warn;

/// The set of options for the data set reader.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub struct ParseOptions {
    /// stop reading once the Pixel Data element of the main data set is found,
    /// leaving it out of the resulting data set
    pub stop_at_pixel_data: bool,
    /// require the 128-byte preamble before the `DICM` magic code
    pub require_preamble: bool,
}

impl ParseOptions {
    /// Create the default set of options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop reading at the Pixel Data element.
    pub fn stop_at_pixel_data(mut self, stop: bool) -> Self {
        self.stop_at_pixel_data = stop;
        self
    }

    /// Require the file preamble.
    pub fn require_preamble(mut self, require: bool) -> Self {
        self.require_preamble = require;
        self
    }
}

/// An open container on the reader's stack.
#[derive(Debug)]
enum Frame {
    Sequence {
        tag: Tag,
        vr: VR,
        end: Option<usize>,
        mode: Mode,
        items: Vec<DataSet>,
    },
    Item {
        end: Option<usize>,
        mode: Mode,
        charset: SpecificCharacterSet,
        set: DataSet,
    },
}

impl Frame {
    fn end(&self) -> Option<usize> {
        match self {
            Frame::Sequence { end, .. } | Frame::Item { end, .. } => *end,
        }
    }
}

/// A reader of a data set body,
/// from the current position of the source to the end of the stream.
#[derive(Debug)]
pub struct DataSetReader<'a> {
    source: Source<'a>,
    mode: Mode,
    options: ParseOptions,
    stack: Vec<Frame>,
    root: DataSet,
    charset: SpecificCharacterSet,
}

impl<'a> DataSetReader<'a> {
    /// Create a reader of the data set at the source's position,
    /// encoded with the given mode.
    pub fn new(source: Source<'a>, mode: Mode, options: ParseOptions) -> Self {
        DataSetReader {
            source,
            mode,
            options,
            stack: Vec::new(),
            root: DataSet::new(),
            charset: SpecificCharacterSet::Default,
        }
    }

    /// Read the full data set.
    pub fn read(mut self) -> Result<DataSet> {
        loop {
            if self.close_finished_frame() {
                continue;
            }
            if self.source.is_at_end() {
                ensure!(
                    self.stack.is_empty(),
                    UnexpectedEndOfStreamSnafu {
                        open: self.stack.len()
                    }
                );
                break;
            }
            let in_sequence = matches!(self.stack.last(), Some(Frame::Sequence { .. }));
            if in_sequence {
                self.read_item_start()?;
            } else if !self.read_element()? {
                break;
            }
        }
        Ok(self.root)
    }

    /// The encoding mode of the innermost open container.
    fn current_mode(&self) -> Mode {
        match self.stack.last() {
            Some(Frame::Sequence { mode, .. }) | Some(Frame::Item { mode, .. }) => *mode,
            None => self.mode,
        }
    }

    fn current_charset(&self) -> SpecificCharacterSet {
        self.stack
            .iter()
            .rev()
            .find_map(|f| match f {
                Frame::Item { charset, .. } => Some(*charset),
                _ => None,
            })
            .unwrap_or(self.charset)
    }

    /// The position where the innermost container of defined length ends,
    /// or the end of the stream.
    fn limit(&self) -> usize {
        self.stack
            .iter()
            .rev()
            .find_map(Frame::end)
            .unwrap_or_else(|| self.source.len())
    }

    /// Pop the innermost frame if its defined length has been fully read.
    fn close_finished_frame(&mut self) -> bool {
        let position = self.source.position();
        match self.stack.last().and_then(Frame::end) {
            Some(end) if end <= position => {
                if end < position {
                    warn!("Container ended at {} but reading reached {}", end, position);
                }
                self.pop_frame();
                true
            }
            _ => false,
        }
    }

    /// Pop the innermost frame and attach its content to its parent.
    fn pop_frame(&mut self) {
        match self.stack.pop() {
            Some(Frame::Item { set, .. }) => {
                if let Some(Frame::Sequence { items, .. }) = self.stack.last_mut() {
                    items.push(set);
                }
            }
            Some(Frame::Sequence {
                tag, vr, items, ..
            }) => {
                let element = DataElement::new(tag, vr, Value::Sequence(items));
                self.current_set().put(element);
            }
            None => {}
        }
    }

    fn current_set(&mut self) -> &mut DataSet {
        match self.stack.last_mut() {
            Some(Frame::Item { set, .. }) => set,
            _ => &mut self.root,
        }
    }

    /// Ensure that a value of `len` bytes starting at the current position
    /// fits in the innermost container.
    fn check_container(&self, tag: Tag, len: u32) -> Result<()> {
        let position = self.source.position();
        let limit = self.limit();
        ensure!(
            position + len as usize <= limit,
            ContainerOverrunSnafu {
                tag,
                len,
                position,
                limit,
            }
        );
        Ok(())
    }

    /// Read an item or sequence delimiter inside a sequence.
    fn read_item_start(&mut self) -> Result<()> {
        let mode = self.current_mode();
        let header = self.source.decode_item_header(mode)?;
        if header.is_sequence_delimiter() {
            if matches!(self.stack.last(), Some(Frame::Sequence { end: Some(_), .. })) {
                warn!("Sequence delimiter found in sequence of defined length");
            }
            self.pop_frame();
            return Ok(());
        }
        let end = match header.len.get() {
            Some(len) => {
                self.check_container(header.tag, len)?;
                Some(self.source.position() + len as usize)
            }
            None => None,
        };
        let charset = self.current_charset();
        self.stack.push(Frame::Item {
            end,
            mode,
            charset,
            set: DataSet::new(),
        });
        Ok(())
    }

    /// Read one element in a data set or item.
    ///
    /// Returns `false` when reading should stop.
    fn read_element(&mut self) -> Result<bool> {
        let mode = self.current_mode();
        let position = self.source.position();
        let header = self.source.decode_header(mode)?;

        if header.is_item_delimiter() {
            ensure!(
                matches!(self.stack.last(), Some(Frame::Item { end: None, .. })),
                UnexpectedDelimiterSnafu {
                    tag: header.tag,
                    position,
                }
            );
            self.pop_frame();
            return Ok(true);
        }
        ensure!(
            header.tag.group() != 0xFFFE,
            UnexpectedItemTagSnafu {
                tag: header.tag,
                position,
            }
        );

        if self.options.stop_at_pixel_data && self.stack.is_empty() && header.tag == tags::PIXEL_DATA
        {
            return Ok(false);
        }

        if header.is_encapsulated_pixeldata() {
            let fragments = self.read_fragments(mode)?;
            self.current_set().put(DataElement::new(
                header.tag,
                header.vr,
                Value::PixelSequence(fragments),
            ));
            return Ok(true);
        }

        let is_sequence =
            header.vr == VR::SQ || (header.vr == VR::UN && header.len.is_undefined());
        if is_sequence {
            self.open_sequence(header, mode)?;
            return Ok(true);
        }

        let len = header.len.get().context(UndefinedValueLengthSnafu {
            tag: header.tag,
            position,
        })?;
        // running past the end of the stream takes precedence
        // over overrunning the container
        if (len as usize) <= self.source.remaining() {
            self.check_container(header.tag, len)?;
        }
        let bytes = self.source.take_value(header.tag, len)?;
        let charset = self.current_charset();
        let value = decode_value(&header, bytes, mode, charset)?;

        if header.tag == tags::SPECIFIC_CHARACTER_SET {
            let code = value.to_str();
            let resolved = SpecificCharacterSet::from_code(&code).unwrap_or_else(|| {
                warn!("Unsupported character set `{}`, using the default", code);
                SpecificCharacterSet::Default
            });
            match self.stack.last_mut() {
                Some(Frame::Item { charset, .. }) => *charset = resolved,
                _ => self.charset = resolved,
            }
        }

        self.current_set()
            .put(DataElement::new(header.tag, header.vr, value));
        Ok(true)
    }

    fn open_sequence(&mut self, header: DataElementHeader, mode: Mode) -> Result<()> {
        // the content of a sequence of unknown VR is implicit VR little endian
        let (vr, mode) = if header.vr == VR::UN {
            (VR::SQ, Mode::IMPLICIT_LE)
        } else {
            (header.vr, mode)
        };
        let end = match header.len.get() {
            Some(len) => {
                self.check_container(header.tag, len)?;
                Some(self.source.position() + len as usize)
            }
            None => None,
        };
        self.stack.push(Frame::Sequence {
            tag: header.tag,
            vr,
            end,
            mode,
            items: Vec::new(),
        });
        Ok(())
    }

    /// Read the items of encapsulated pixel data,
    /// up to and including the sequence delimiter.
    fn read_fragments(&mut self, mode: Mode) -> Result<PixelFragments> {
        let mut out = PixelFragments::default();
        let mut first = true;
        loop {
            let header = self.source.decode_item_header(mode)?;
            if header.is_sequence_delimiter() {
                break;
            }
            let position = self.source.position();
            let len = header.len.get().context(UndefinedValueLengthSnafu {
                tag: header.tag,
                position,
            })?;
            self.check_container(header.tag, len)?;
            if first {
                ensure!(len % 4 == 0, InvalidOffsetTableSnafu { len, position });
                let table = self.source.take_value(header.tag, len)?;
                out.offset_table = table.chunks_exact(4).map(|c| mode.u32(c)).collect();
                first = false;
            } else {
                out.fragments.push(Fragment {
                    offset: position as u64,
                    length: len,
                });
                self.source.skip(len as usize);
            }
        }
        Ok(out)
    }
}
