//! Baseline scheme: empty brackets, so runs measure loop and timer overhead.

use super::Scheme;

pub struct Nop;

impl Scheme for Nop {
    type Handle = ();

    fn global_init(_threads: usize) -> Self {
        Nop
    }

    fn thread_init(&self, _tid: usize) -> Self::Handle {}

    #[inline]
    fn enter_read(&self, _handle: &mut Self::Handle) {}

    #[inline]
    fn exit_read(&self, _handle: &mut Self::Handle) {}

    #[inline]
    fn enter_update(&self, _handle: &mut Self::Handle) {}

    #[inline]
    fn exit_update(&self, _handle: &mut Self::Handle) {}
}

#[cfg(test)]
mod tests {
    use super::super::tests;
    use super::Nop;

    #[test]
    fn brackets_are_free_of_side_effects() {
        tests::bracket_smoke::<Nop>(4, 10_000);
    }
}
