use crate::error::HarvestError;

const MONTH_LABELS: [&str; 12] = [
    "1.Enero",
    "2.Febrero",
    "3.Marzo",
    "4.Abril",
    "5.Mayo",
    "6.Junio",
    "7.Julio",
    "8.Agosto",
    "9.Septiembre",
    "10.Octubre",
    "11.Noviembre",
    "12.Diciembre",
];

fn check_month(month: u32) -> Result<u32, HarvestError> {
    if (1..=12).contains(&month) {
        Ok(month)
    } else {
        Err(HarvestError::InvalidRange(format!(
            "month {month} is outside 1..=12"
        )))
    }
}

/// Archival folder label for a month number, e.g. `3` -> `"3.Marzo"`.
pub fn month_label(month: u32) -> Result<&'static str, HarvestError> {
    let month = check_month(month)?;
    Ok(MONTH_LABELS[(month - 1) as usize])
}

/// Months a run iterates, in order.
///
/// Neither bound yields the whole year, both bounds yield the closed range,
/// and a single bound yields just that month.
pub fn generate_months(start: Option<u32>, end: Option<u32>) -> Result<Vec<u32>, HarvestError> {
    match (start, end) {
        (None, None) => Ok((1..=12).collect()),
        (Some(start), Some(end)) => {
            let start = check_month(start)?;
            let end = check_month(end)?;
            if start > end {
                return Err(HarvestError::InvalidRange(format!(
                    "start month {start} is after end month {end}"
                )));
            }
            Ok((start..=end).collect())
        }
        (Some(only), None) | (None, Some(only)) => Ok(vec![check_month(only)?]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn labels_are_unique_and_stable() {
        let labels: BTreeSet<&str> = (1..=12).map(|m| month_label(m).unwrap()).collect();
        assert_eq!(labels.len(), 12);
        assert_eq!(month_label(1).unwrap(), "1.Enero");
        assert_eq!(month_label(9).unwrap(), "9.Septiembre");
        assert_eq!(month_label(12).unwrap(), "12.Diciembre");
        assert_eq!(month_label(12).unwrap(), month_label(12).unwrap());
    }

    #[test]
    fn out_of_domain_months_fail() {
        assert!(matches!(month_label(0), Err(HarvestError::InvalidRange(_))));
        assert!(matches!(month_label(13), Err(HarvestError::InvalidRange(_))));
        assert!(matches!(
            generate_months(Some(0), Some(3)),
            Err(HarvestError::InvalidRange(_))
        ));
        assert!(matches!(
            generate_months(Some(1), Some(13)),
            Err(HarvestError::InvalidRange(_))
        ));
        assert!(matches!(
            generate_months(None, Some(13)),
            Err(HarvestError::InvalidRange(_))
        ));
    }

    #[test]
    fn generate_months_cases() {
        assert!(matches!(
            generate_months(Some(3), Some(1)),
            Err(HarvestError::InvalidRange(_))
        ));
        assert_eq!(generate_months(None, None).unwrap(), (1..=12).collect::<Vec<_>>());
        assert_eq!(generate_months(Some(5), None).unwrap(), vec![5]);
        assert_eq!(generate_months(None, Some(7)).unwrap(), vec![7]);
        assert_eq!(generate_months(Some(2), Some(4)).unwrap(), vec![2, 3, 4]);
        assert_eq!(generate_months(Some(6), Some(6)).unwrap(), vec![6]);
    }
}
