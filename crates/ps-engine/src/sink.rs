//! Output side of the engine.

use alloc::vec::Vec;
use ps_ir::NoteEvent;

/// Receives note events as the engine emits them, in emission order.
///
/// Called from the tick path; implementations should not block.
pub trait EventSink {
    fn emit(&mut self, event: NoteEvent);
}

impl EventSink for Vec<NoteEvent> {
    fn emit(&mut self, event: NoteEvent) {
        self.push(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: NoteEvent) {
        (**self).emit(event);
    }
}

/// Adapts a closure into a sink.
pub struct FnSink<F>(pub F);

impl<F: FnMut(NoteEvent)> EventSink for FnSink<F> {
    fn emit(&mut self, event: NoteEvent) {
        (self.0)(event);
    }
}
