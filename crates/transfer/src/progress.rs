use printlink_protocol::constants::MAX_UNCONFIRMED_PROGRESS;

/// Upload percentage after `sent` of `total` bytes were published.
///
/// `floor(sent * 100 / total)`, capped at 99: only a confirmed result may
/// report 100. A zero-byte file reports 99 once its single chunk is out.
pub fn progress_percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return MAX_UNCONFIRMED_PROGRESS;
    }
    let pct = u128::from(sent) * 100 / u128::from(total);
    pct.min(u128::from(MAX_UNCONFIRMED_PROGRESS)) as u8
}
