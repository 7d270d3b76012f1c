use ufmt::uWrite;

/// Writes a value given in hundredths with `precision` fractional digits.
///
/// Rounds half away from zero, on the integer value, so `2505` at precision 1
/// is `25.1` and `-5` is `-0.1`. Precision is capped at 2, there are no more
/// digits to show.
pub fn write_fixed<W>(out: &mut W, centi: i32, precision: u8) -> Result<(), W::Error>
where
    W: uWrite + ?Sized,
{
    let precision = precision.min(2);
    let divisor = 10_u32.pow(2 - precision as u32);
    let scale = 10_u32.pow(precision as u32);

    let rounded = (centi.unsigned_abs() + divisor / 2) / divisor;
    if centi < 0 && rounded != 0 {
        out.write_char('-')?;
    }
    ufmt::uwrite!(out, "{}", rounded / scale)?;

    if precision > 0 {
        out.write_char('.')?;
        let frac = rounded % scale;
        if precision == 2 && frac < 10 {
            out.write_char('0')?;
        }
        ufmt::uwrite!(out, "{}", frac)?;
    }
    Ok(())
}

/// Renders a value given in hundredths followed by its unit, e.g. `21.30 C`.
pub fn format_fixed_measurement(centi: i32, precision: u8, unit: &str) -> heapless::String<16> {
    let mut output: heapless::String<16> = heapless::String::new();
    // the number takes at most 12 bytes, a unit that doesn't fit is cut
    if write_fixed(&mut output, centi, precision).is_ok() {
        for c in core::iter::once(' ').chain(unit.chars()) {
            if output.push(c).is_err() {
                break;
            }
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::{format_fixed_measurement, write_fixed};

    fn fixed(centi: i32, precision: u8) -> heapless::String<16> {
        let mut out = heapless::String::new();
        write_fixed(&mut out, centi, precision).unwrap();
        out
    }

    #[test]
    fn format_zero() {
        assert_eq!(fixed(0, 1).as_str(), "0.0");
        assert_eq!(fixed(0, 2).as_str(), "0.00");
    }

    #[test]
    fn format_small_fract() {
        assert_eq!(fixed(101, 2).as_str(), "1.01");
    }

    #[test]
    fn format_rounds_half_up() {
        assert_eq!(fixed(2508, 1).as_str(), "25.1");
        assert_eq!(fixed(2505, 1).as_str(), "25.1");
        assert_eq!(fixed(2504, 1).as_str(), "25.0");
    }

    #[test]
    fn format_carry_over() {
        assert_eq!(fixed(1996, 1).as_str(), "20.0");
        assert_eq!(fixed(99, 0).as_str(), "1");
    }

    #[test]
    fn format_negative() {
        assert_eq!(fixed(-1234, 1).as_str(), "-12.3");
        assert_eq!(fixed(-5, 1).as_str(), "-0.1");
        assert_eq!(fixed(-4, 1).as_str(), "0.0");
    }

    #[test]
    fn format_extremes() {
        assert_eq!(fixed(i32::MIN, 2).as_str(), "-21474836.48");
        assert_eq!(fixed(i32::MAX, 0).as_str(), "21474836");
    }

    #[test]
    fn format_with_unit() {
        assert_eq!(format_fixed_measurement(2130, 2, "C").as_str(), "21.30 C");
        assert_eq!(format_fixed_measurement(-150, 1, "C").as_str(), "-1.5 C");
    }
}
