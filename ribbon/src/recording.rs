// Copyright 2025 the Ribbon Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A device that records commands instead of executing them.
//!
//! Useful for tests, and for inspecting what a line would send to a GPU.

use std::collections::HashMap;

use crate::{
    Error,
    device::{
        BufferKind, BufferUpload, BufferUsage, Device, DrawCall, DrawState, ElementType,
        LineUniforms, VertexFormat, VertexView,
    },
};

/// Handle of a buffer on a [`Recording`] device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

/// Handle of a texture on a [`Recording`] device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// A vertex attribute as seen by a recorded draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedView {
    /// Buffer read from.
    pub buffer: BufferId,
    /// Byte offset of the first value.
    pub offset: u64,
    /// Format of each value.
    pub format: VertexFormat,
}

/// A recorded draw call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDraw {
    /// Previous, current and next position views.
    pub positions: [RecordedView; 3],
    /// Opacity view.
    pub opacity: RecordedView,
    /// Width scale view.
    pub offset_scale: RecordedView,
    /// Palette index view.
    pub color_index: RecordedView,
    /// Index buffer.
    pub indices: BufferId,
    /// Number of indices drawn.
    pub index_count: u32,
    /// Color table texture.
    pub color_table: TextureId,
    /// Uniform values.
    pub uniforms: LineUniforms,
    /// Fixed-function state.
    pub state: DrawState,
}

/// A command recorded by a [`Recording`] device.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// A buffer was created.
    CreateBuffer(BufferId, BufferKind),
    /// A buffer's contents were replaced.
    Upload {
        /// Target buffer.
        buffer: BufferId,
        /// Usage hint.
        usage: BufferUsage,
        /// Element type.
        element: ElementType,
        /// Number of bytes uploaded.
        len: usize,
    },
    /// A texture was created.
    CreateTexture(TextureId, u32),
    /// A buffer was destroyed.
    DestroyBuffer(BufferId),
    /// A texture was destroyed.
    DestroyTexture(TextureId),
    /// A draw was issued.
    Draw(Box<RecordedDraw>),
}

/// A [`Device`] that keeps a log of commands and a CPU copy of every live resource.
#[derive(Debug, Default)]
pub struct Recording {
    /// Every command issued so far, in order.
    pub commands: Vec<Command>,
    buffers: HashMap<BufferId, Vec<u8>>,
    textures: HashMap<TextureId, (u32, Vec<u8>)>,
    next_id: u32,
    max_buffer_size: Option<u64>,
}

impl Recording {
    /// Creates an empty recording.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a recording that refuses uploads larger than `max` bytes.
    pub fn with_max_buffer_size(max: u64) -> Self {
        Self {
            max_buffer_size: Some(max),
            ..Self::default()
        }
    }

    /// The recorded draws.
    pub fn draws(&self) -> impl Iterator<Item = &RecordedDraw> {
        self.commands.iter().filter_map(|command| match command {
            Command::Draw(draw) => Some(&**draw),
            _ => None,
        })
    }

    /// The current contents of a live buffer.
    pub fn buffer(&self, id: BufferId) -> Option<&[u8]> {
        self.buffers.get(&id).map(Vec::as_slice)
    }

    /// The side and pixels of a live texture.
    pub fn texture(&self, id: TextureId) -> Option<(u32, &[u8])> {
        self.textures
            .get(&id)
            .map(|(side, pixels)| (*side, pixels.as_slice()))
    }

    /// Number of buffers that have been created and not destroyed.
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Number of textures that have been created and not destroyed.
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Forgets the recorded commands, keeping the resources.
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn view(
        &self,
        buffer: &BufferId,
        offset: u64,
        format: VertexFormat,
    ) -> Result<RecordedView, Error> {
        if !self.buffers.contains_key(buffer) {
            return Err(Error::UnknownResource);
        }
        Ok(RecordedView {
            buffer: *buffer,
            offset,
            format,
        })
    }
}

impl Device for Recording {
    type Buffer = BufferId;
    type Texture = TextureId;

    fn create_buffer(&mut self, kind: BufferKind) -> Result<BufferId, Error> {
        let id = BufferId(self.next_id());
        self.buffers.insert(id, Vec::new());
        self.commands.push(Command::CreateBuffer(id, kind));
        Ok(id)
    }

    fn upload_buffer(
        &mut self,
        buffer: &mut BufferId,
        upload: BufferUpload<'_>,
    ) -> Result<(), Error> {
        let size = upload.data.len() as u64;
        if let Some(max) = self.max_buffer_size {
            if size > max {
                return Err(Error::BufferTooLarge { size, max });
            }
        }
        let contents = self.buffers.get_mut(buffer).ok_or(Error::UnknownResource)?;
        contents.clear();
        contents.extend_from_slice(upload.data);
        self.commands.push(Command::Upload {
            buffer: *buffer,
            usage: upload.usage,
            element: upload.element,
            len: upload.data.len(),
        });
        Ok(())
    }

    fn create_texture(&mut self, pixels: &[u8], side: u32) -> Result<TextureId, Error> {
        let id = TextureId(self.next_id());
        self.textures.insert(id, (side, pixels.to_vec()));
        self.commands.push(Command::CreateTexture(id, side));
        Ok(id)
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
        self.commands.push(Command::DestroyBuffer(buffer));
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
        self.commands.push(Command::DestroyTexture(texture));
    }

    fn draw(&mut self, call: &DrawCall<'_, BufferId, TextureId>) -> Result<(), Error> {
        let [prev, curr, next] = call.positions;
        let view = |v: VertexView<'_, BufferId>| self.view(v.buffer, v.offset, v.format);
        let draw = RecordedDraw {
            positions: [view(prev)?, view(curr)?, view(next)?],
            opacity: view(call.opacity)?,
            offset_scale: view(call.offset_scale)?,
            color_index: view(call.color_index)?,
            indices: *call.indices,
            index_count: call.index_count,
            color_table: *call.color_table,
            uniforms: call.uniforms,
            state: call.state,
        };
        if !self.buffers.contains_key(&draw.indices)
            || !self.textures.contains_key(&draw.color_table)
        {
            return Err(Error::UnknownResource);
        }
        self.commands.push(Command::Draw(Box::new(draw)));
        Ok(())
    }
}
