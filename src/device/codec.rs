use crate::device::types::TelemetryChannel;
use crate::error::DecodeError;

/**
 * Encodes a tuning command as the two frames the vehicle expects: the opcode
 * byte, followed by the value as a little-endian IEEE-754 single.
 * The frames are written separately and in this order.
 */
pub fn encode_command(opcode: u8, value: f32) -> ([u8; 1], [u8; 4]) {
    ([opcode], value.to_le_bytes())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryUpdate {
    pub channel: TelemetryChannel,
    pub value: f32,
}

/**
 * Decoder state carried between two successive notifications.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeContext {
    #[default]
    AwaitingOpcode,
    AwaitingValue(u8),
}

impl DecodeContext {
    /// Consumes one inbound frame. `Ok(None)` means the frame was an opcode and a value is expected next.
    pub fn feed(&mut self, frame: &[u8]) -> Result<Option<TelemetryUpdate>, DecodeError> {
        match frame.len() {
            1 => {
                // an unconsumed opcode is overwritten
                *self = DecodeContext::AwaitingValue(frame[0]);
                Ok(None)
            },
            4 => {
                let opcode = match std::mem::take(self) {
                    DecodeContext::AwaitingValue(opcode) => opcode,
                    DecodeContext::AwaitingOpcode => return Err(DecodeError::MissingOpcode),
                };

                let mut bytes = [0u8; 4];
                bytes.copy_from_slice(frame);
                let value = f32::from_le_bytes(bytes);

                match TelemetryChannel::from_opcode(opcode) {
                    Some(channel) => Ok(Some(TelemetryUpdate { channel, value })),
                    None => Err(DecodeError::UnknownOpcode(opcode)),
                }
            },
            len => Err(DecodeError::UnexpectedLength(len)),
        }
    }

    pub fn reset(&mut self) {
        *self = DecodeContext::AwaitingOpcode;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::types::TELEMETRY_CHANNELS;

    fn decode_pair(context: &mut DecodeContext, opcode: u8, value: f32) -> Result<Option<TelemetryUpdate>, DecodeError> {
        let (opcode_frame, value_frame) = encode_command(opcode, value);
        assert_eq!(context.feed(&opcode_frame), Ok(None));
        context.feed(&value_frame)
    }

    #[test]
    fn encodes_opcode_then_little_endian_value() {
        let (opcode, value) = encode_command(0x02, 1.0);
        assert_eq!(opcode, [0x02]);
        assert_eq!(value, [0x00, 0x00, 0x80, 0x3F]);
    }

    #[test]
    fn round_trip_is_bit_exact() {
        let values = [0.0_f32, -0.0, 3.14, -273.15, f32::MIN_POSITIVE, f32::MAX, f32::MIN, 1.0e-40];
        let mut context = DecodeContext::default();

        for channel in TELEMETRY_CHANNELS {
            for value in values {
                let update = decode_pair(&mut context, channel.opcode(), value)
                    .expect("decode failed")
                    .expect("no update");
                assert_eq!(update.channel, channel);
                assert_eq!(update.value.to_bits(), value.to_bits());
            }
        }
    }

    #[test]
    fn angle_update() {
        let mut context = DecodeContext::default();
        assert_eq!(context.feed(&[0x02]), Ok(None));
        assert_eq!(context, DecodeContext::AwaitingValue(0x02));

        let update = context.feed(&3.14_f32.to_le_bytes()).unwrap().unwrap();
        assert_eq!(update, TelemetryUpdate { channel: TelemetryChannel::Angle, value: 3.14 });
        assert_eq!(context, DecodeContext::AwaitingOpcode);
    }

    #[test]
    fn value_without_opcode() {
        let mut context = DecodeContext::default();
        assert_eq!(context.feed(&1.5_f32.to_le_bytes()), Err(DecodeError::MissingOpcode));
    }

    #[test]
    fn value_is_not_reused_for_a_second_frame() {
        let mut context = DecodeContext::default();
        decode_pair(&mut context, 0x01, 2.0).unwrap().unwrap();
        assert_eq!(context.feed(&2.0_f32.to_le_bytes()), Err(DecodeError::MissingOpcode));
    }

    #[test]
    fn unknown_opcode() {
        let mut context = DecodeContext::default();
        assert_eq!(decode_pair(&mut context, 0x05, 1.0), Err(DecodeError::UnknownOpcode(0x05)));
        // the unknown opcode is consumed as well
        assert_eq!(context, DecodeContext::AwaitingOpcode);
        assert_eq!(context.feed(&1.0_f32.to_le_bytes()), Err(DecodeError::MissingOpcode));
    }

    #[test]
    fn second_opcode_overwrites_the_first() {
        let mut context = DecodeContext::default();
        context.feed(&[0x00]).unwrap();
        context.feed(&[0x04]).unwrap();
        let update = context.feed(&50.0_f32.to_le_bytes()).unwrap().unwrap();
        assert_eq!(update.channel, TelemetryChannel::Pwm);
    }

    #[test]
    fn unexpected_lengths() {
        let mut context = DecodeContext::default();
        assert_eq!(context.feed(&[]), Err(DecodeError::UnexpectedLength(0)));
        assert_eq!(context.feed(&[0x00, 0x01]), Err(DecodeError::UnexpectedLength(2)));
        assert_eq!(context.feed(&[0; 5]), Err(DecodeError::UnexpectedLength(5)));
    }

    #[test]
    fn unexpected_length_keeps_pending_opcode() {
        let mut context = DecodeContext::default();
        context.feed(&[0x03]).unwrap();
        assert!(context.feed(&[0x00, 0x00]).is_err());
        let update = context.feed(&7.0_f32.to_le_bytes()).unwrap().unwrap();
        assert_eq!(update.channel, TelemetryChannel::RegulatedOutput);
    }
}
