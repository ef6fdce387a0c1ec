use uuid::Uuid;

/**
 * How long (milliseconds) a write to a characteristic may take.
 */
pub const WRITE_DEADLINE: u64 = 2000;

/**
 * How long (milliseconds) the adapter may take to report its power state.
 */
pub const ADAPTER_STATE_DEADLINE: u64 = 2000;

/**
 * The advertised local name of the vehicle. Matched exactly, case-sensitive.
 */
pub const PERIPHERAL_NAME: &str = "Segway";

/**
 * The 16-bit identifier of the GATT service holding both data characteristics.
 */
pub const SERVICE_ID: u16 = 0x2220;

/**
 * The 16-bit identifier of the characteristic the vehicle notifies telemetry on.
 */
pub const READ_CHARACTERISTIC_ID: u16 = 0x2221;

/**
 * The 16-bit identifier of the characteristic tuning commands are written to.
 */
pub const WRITE_CHARACTERISTIC_ID: u16 = 0x2222;

/**
 * Bluetooth base UUID, 16-bit identifiers are placed in bits 96..112.
 */
const BLUETOOTH_BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805f9b34fb;

pub const fn uuid_from_u16(short: u16) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | ((short as u128) << 96))
}

pub const SERVICE_UUID: Uuid = uuid_from_u16(SERVICE_ID);
pub const READ_CHARACTERISTIC_UUID: Uuid = uuid_from_u16(READ_CHARACTERISTIC_ID);
pub const WRITE_CHARACTERISTIC_UUID: Uuid = uuid_from_u16(WRITE_CHARACTERISTIC_ID);

/**
 * Tuning values the vehicle firmware was calibrated with.
 */
pub const DEFAULT_PROPORTIONAL_GAIN: f32 = 0.89;
pub const DEFAULT_INTEGRAL_GAIN: f32 = 0.00;
pub const DEFAULT_DERIVATIVE_GAIN: f32 = 0.22;
pub const DEFAULT_OUTPUT_SCALE: f32 = 1.50;

/**
 * Value every telemetry channel shows until the first update arrives.
 */
pub const DEFAULT_TELEMETRY_VALUE: f32 = 1.00;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_ids_expand_on_the_base_uuid() {
        assert_eq!(SERVICE_UUID.to_string(), "00002220-0000-1000-8000-00805f9b34fb");
        assert_eq!(READ_CHARACTERISTIC_UUID.to_string(), "00002221-0000-1000-8000-00805f9b34fb");
        assert_eq!(WRITE_CHARACTERISTIC_UUID.to_string(), "00002222-0000-1000-8000-00805f9b34fb");
    }
}
