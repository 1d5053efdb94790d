//! Audio chip trait for pluggable sound generators.

/// Common interface of the sound chips a system drives from its scheduler.
///
/// Chips produce unsigned 8-bit samples at their own fixed rate; the system
/// decides how often to call [`AudioChip::process`] and mixes the results.
pub trait AudioChip {
    /// Write to a register on the audio chip
    fn write_register(&mut self, addr: u16, val: u8);

    /// Read from a register on the audio chip (if supported)
    fn read_register(&self, addr: u16) -> u8 {
        let _ = addr;
        0
    }

    /// Synthesize `count` samples and append them to `out`.
    fn process(&mut self, count: usize, out: &mut Vec<u8>);

    /// Reset the chip to power-on state
    fn reset(&mut self);

    /// Native output sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Convenience wrapper returning a fresh buffer.
    fn generate_samples(&mut self, count: usize) -> Vec<u8> {
        let mut samples = Vec::with_capacity(count);
        self.process(count, &mut samples);
        samples
    }
}
