//! IPR 邻面去釉图表模型
//!
//! 每颗牙齿记录近中（朝向中线）与远中（背离中线）两个去釉量，
//! 相邻两颗牙之间的间隙展示值由隔着该间隙相对的两个牙面数值求和。
//! 上下颌的近远中方向互为镜像，且展示遍历顺序相反，因此邻接关系
//! 与过中线间隙按颌别用显式表编码，而不是一条对称公式。

use aligner_core::{is_valid_tooth, CaseError, IprEntry, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 颌别
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Jaw {
    /// 上颌，牙位 1-16，中线位于 8|9
    Upper,
    /// 下颌，牙位 17-32，中线位于 24|25
    Lower,
}

/// 上颌过中线牙对
pub const UPPER_MIDLINE_PAIR: (u8, u8) = (8, 9);
/// 下颌过中线牙对
pub const LOWER_MIDLINE_PAIR: (u8, u8) = (24, 25);

/// 牙面
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Surface {
    Mesial,
    Distal,
}

/// 牙弓上的一个间隙位置
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Gap {
    /// 牙弓最外侧的边缘间隙，只取单颗牙的远中值
    Edge(u8),
    /// 两颗相邻牙之间的间隙
    Between(u8, u8),
}

/// 判定牙位所属颌别
pub fn jaw_of(tooth: u8) -> Result<Jaw> {
    match tooth {
        1..=16 => Ok(Jaw::Upper),
        17..=32 => Ok(Jaw::Lower),
        other => Err(CaseError::Validation(format!(
            "invalid tooth number: {}",
            other
        ))),
    }
}

/// 取图表中某颗牙某个牙面的数值，未记录按零计
fn surface_value(chart: &BTreeMap<u8, IprEntry>, tooth: u8, surface: Surface) -> Decimal {
    match chart.get(&tooth) {
        Some(entry) => match surface {
            Surface::Mesial => entry.mesial,
            Surface::Distal => entry.distal,
        },
        None => Decimal::ZERO,
    }
}

/// 隔着 low|high 间隙相对的两个牙面
///
/// 过中线间隙两侧都是近中面；其余内部间隙由离中线远的一侧出近中面、
/// 离中线近的一侧出远中面。
fn facing_surfaces(low: u8, high: u8) -> Result<[(u8, Surface); 2]> {
    let jaw = jaw_of(low)?;
    if jaw_of(high)? != jaw || high - low != 1 {
        return Err(CaseError::Validation(format!(
            "teeth {} and {} are not adjacent within one jaw",
            low, high
        )));
    }

    Ok(match jaw {
        Jaw::Upper => match (low, high) {
            UPPER_MIDLINE_PAIR => [(low, Surface::Mesial), (high, Surface::Mesial)],
            (l, h) if h <= UPPER_MIDLINE_PAIR.0 => {
                [(l, Surface::Mesial), (h, Surface::Distal)]
            }
            (l, h) => [(l, Surface::Distal), (h, Surface::Mesial)],
        },
        Jaw::Lower => match (low, high) {
            LOWER_MIDLINE_PAIR => [(low, Surface::Mesial), (high, Surface::Mesial)],
            (l, h) if h <= LOWER_MIDLINE_PAIR.0 => {
                [(l, Surface::Mesial), (h, Surface::Distal)]
            }
            (l, h) => [(l, Surface::Distal), (h, Surface::Mesial)],
        },
    })
}

/// 大于零时保留两位小数返回，零视为"无数值"而不是 0
fn displayable(sum: Decimal) -> Option<Decimal> {
    if sum > Decimal::ZERO {
        Some(sum.round_dp(2))
    } else {
        None
    }
}

/// 推导两颗相邻牙之间间隙的展示值
///
/// 对调用方的牙位顺序不敏感，内部按颌别判定哪一侧靠近中线。
pub fn derive_gap_value(
    chart: &BTreeMap<u8, IprEntry>,
    tooth_a: u8,
    tooth_b: u8,
) -> Result<Option<Decimal>> {
    let (low, high) = if tooth_a <= tooth_b {
        (tooth_a, tooth_b)
    } else {
        (tooth_b, tooth_a)
    };
    let surfaces = facing_surfaces(low, high)?;
    let sum: Decimal = surfaces
        .iter()
        .map(|(tooth, surface)| surface_value(chart, *tooth, *surface))
        .sum();
    Ok(displayable(sum))
}

/// 推导牙弓边缘间隙的展示值
///
/// 仅牙弓末端的四颗牙（1、16、17、32）有边缘间隙，取其远中值。
pub fn derive_edge_value(chart: &BTreeMap<u8, IprEntry>, tooth: u8) -> Result<Option<Decimal>> {
    match tooth {
        1 | 16 | 17 | 32 => Ok(displayable(surface_value(chart, tooth, Surface::Distal))),
        other => Err(CaseError::Validation(format!(
            "tooth {} is not at the end of an arch",
            other
        ))),
    }
}

/// 按间隙位置推导展示值
pub fn derive(chart: &BTreeMap<u8, IprEntry>, gap: Gap) -> Result<Option<Decimal>> {
    match gap {
        Gap::Edge(tooth) => derive_edge_value(chart, tooth),
        Gap::Between(a, b) => derive_gap_value(chart, a, b),
    }
}

/// 按展示顺序枚举一侧牙弓的全部间隙
///
/// 上颌从牙位 1 到 16，下颌按镜像方向从 32 到 17。
pub fn display_gaps(jaw: Jaw) -> Vec<Gap> {
    let mut gaps = Vec::with_capacity(17);
    match jaw {
        Jaw::Upper => {
            gaps.push(Gap::Edge(1));
            for tooth in 1..16 {
                gaps.push(Gap::Between(tooth, tooth + 1));
            }
            gaps.push(Gap::Edge(16));
        }
        Jaw::Lower => {
            gaps.push(Gap::Edge(32));
            for tooth in (18..=32).rev() {
                gaps.push(Gap::Between(tooth, tooth - 1));
            }
            gaps.push(Gap::Edge(17));
        }
    }
    gaps
}

/// 保存前的图表归一化
///
/// 校验牙位与数值符号，保留两位小数，剔除近中远中均为零的行，
/// 零行不落盘。
pub fn normalize_chart(updates: &BTreeMap<u8, IprEntry>) -> Result<BTreeMap<u8, IprEntry>> {
    let mut normalized = BTreeMap::new();
    for (tooth, entry) in updates {
        if !is_valid_tooth(*tooth) {
            return Err(CaseError::Validation(format!(
                "invalid tooth number: {}",
                tooth
            )));
        }
        if entry.mesial.is_sign_negative() || entry.distal.is_sign_negative() {
            return Err(CaseError::Validation(format!(
                "IPR values for tooth {} must be non-negative",
                tooth
            )));
        }
        let rounded = IprEntry {
            mesial: entry.mesial.round_dp(2),
            distal: entry.distal.round_dp(2),
        };
        if !rounded.is_empty() {
            normalized.insert(*tooth, rounded);
        }
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(mesial: Decimal, distal: Decimal) -> IprEntry {
        IprEntry { mesial, distal }
    }

    #[test]
    fn test_upper_midline_gap_sums_both_mesials() {
        let mut chart = BTreeMap::new();
        chart.insert(8, entry(dec!(0.3), dec!(0.1)));
        chart.insert(9, entry(dec!(0.2), dec!(0.4)));

        assert_eq!(derive_gap_value(&chart, 8, 9).unwrap(), Some(dec!(0.5)));
        // 顺序不敏感
        assert_eq!(derive_gap_value(&chart, 9, 8).unwrap(), Some(dec!(0.5)));
    }

    #[test]
    fn test_lower_midline_gap_sums_both_mesials() {
        let mut chart = BTreeMap::new();
        chart.insert(24, entry(dec!(0.25), dec!(0.1)));
        chart.insert(25, entry(dec!(0.15), dec!(0.3)));

        assert_eq!(derive_gap_value(&chart, 25, 24).unwrap(), Some(dec!(0.4)));
    }

    #[test]
    fn test_internal_gap_sums_facing_surfaces() {
        // 上颌 6|7：6 离中线更远出近中面，7 靠近中线出远中面
        let mut chart = BTreeMap::new();
        chart.insert(6, entry(dec!(0.2), dec!(0.9)));
        chart.insert(7, entry(dec!(0.9), dec!(0.1)));
        assert_eq!(derive_gap_value(&chart, 6, 7).unwrap(), Some(dec!(0.3)));

        // 上颌 10|11：10 靠近中线出远中面，11 出近中面
        let mut chart = BTreeMap::new();
        chart.insert(10, entry(dec!(0.9), dec!(0.2)));
        chart.insert(11, entry(dec!(0.1), dec!(0.9)));
        assert_eq!(derive_gap_value(&chart, 10, 11).unwrap(), Some(dec!(0.3)));

        // 下颌 17|18：18 靠近中线（中线位于 24|25）
        let mut chart = BTreeMap::new();
        chart.insert(17, entry(dec!(0.3), dec!(0.9)));
        chart.insert(18, entry(dec!(0.9), dec!(0.2)));
        assert_eq!(derive_gap_value(&chart, 17, 18).unwrap(), Some(dec!(0.5)));

        // 下颌 30|31：30 靠近中线出远中面
        let mut chart = BTreeMap::new();
        chart.insert(30, entry(dec!(0.9), dec!(0.1)));
        chart.insert(31, entry(dec!(0.2), dec!(0.9)));
        assert_eq!(derive_gap_value(&chart, 31, 30).unwrap(), Some(dec!(0.3)));
    }

    #[test]
    fn test_edge_gap_uses_single_distal_value() {
        let mut chart = BTreeMap::new();
        chart.insert(16, entry(dec!(0.1), dec!(0.4)));

        assert_eq!(derive_edge_value(&chart, 16).unwrap(), Some(dec!(0.4)));
        assert_eq!(derive_edge_value(&chart, 1).unwrap(), None);
        assert!(derive_edge_value(&chart, 5).is_err());
    }

    #[test]
    fn test_zero_sum_renders_as_no_value() {
        let mut chart = BTreeMap::new();
        chart.insert(3, entry(Decimal::ZERO, dec!(0.5)));
        chart.insert(4, entry(dec!(0.5), Decimal::ZERO));

        // 3|4 间隙取 3 的近中与 4 的远中，两者均为零
        assert_eq!(derive_gap_value(&chart, 3, 4).unwrap(), None);

        // 两颗牙都未记录同样视为无数值
        assert_eq!(derive_gap_value(&chart, 12, 13).unwrap(), None);
    }

    #[test]
    fn test_adjacency_is_enforced_per_jaw() {
        let chart = BTreeMap::new();

        // 16 与 17 分属上下颌，不相邻
        assert!(derive_gap_value(&chart, 16, 17).is_err());
        assert!(derive_gap_value(&chart, 4, 6).is_err());
        assert!(derive_gap_value(&chart, 0, 1).is_err());
        assert!(derive_gap_value(&chart, 32, 33).is_err());
    }

    #[test]
    fn test_display_gaps_enumeration() {
        let upper = display_gaps(Jaw::Upper);
        assert_eq!(upper.len(), 17);
        assert_eq!(upper[0], Gap::Edge(1));
        assert_eq!(upper[8], Gap::Between(8, 9));
        assert_eq!(upper[16], Gap::Edge(16));

        // 下颌按镜像方向遍历
        let lower = display_gaps(Jaw::Lower);
        assert_eq!(lower.len(), 17);
        assert_eq!(lower[0], Gap::Edge(32));
        assert_eq!(lower[8], Gap::Between(25, 24));
        assert_eq!(lower[16], Gap::Edge(17));

        // 所有枚举出的间隙都可推导
        let chart = BTreeMap::new();
        for gap in upper.into_iter().chain(lower) {
            assert!(derive(&chart, gap).is_ok());
        }
    }

    #[test]
    fn test_normalize_chart_drops_zero_rows() {
        let mut updates = BTreeMap::new();
        updates.insert(5, entry(dec!(0.2), Decimal::ZERO));
        updates.insert(6, entry(Decimal::ZERO, Decimal::ZERO));
        updates.insert(7, entry(dec!(0.123), dec!(0.456)));

        let normalized = normalize_chart(&updates).unwrap();
        assert_eq!(normalized.len(), 2);
        assert!(!normalized.contains_key(&6));
        // 保留两位小数
        assert_eq!(normalized[&7].mesial, dec!(0.12));
        assert_eq!(normalized[&7].distal, dec!(0.46));
    }

    #[test]
    fn test_normalize_chart_rejects_invalid_input() {
        let mut updates = BTreeMap::new();
        updates.insert(33, entry(dec!(0.1), Decimal::ZERO));
        assert!(normalize_chart(&updates).is_err());

        let mut updates = BTreeMap::new();
        updates.insert(5, entry(dec!(-0.1), Decimal::ZERO));
        assert!(normalize_chart(&updates).is_err());
    }
}
