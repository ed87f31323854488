//! 伺服器端 HTML 產生；所有外部字串都經過 `escape_html`。

use crate::core::sorting::{sort_icon, HoldingSort, SummarySort, WarrantSort};
use crate::core::volume::VolumeSort;
use crate::domain::model::{
    ChangeStats, CrossHolding, DecreasedHolding, EtfInfo, Holding, HoldingWithChange, NamedChange,
    NewHolding, UnderlyingSummary, VolumeAnalysis, VolumeComparison, Warrant, WarrantStatistics,
    WarrantType,
};

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
    out
}

/// 千分位
pub fn fmt_int(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if value < 0 {
        format!("-{}", out)
    } else {
        out
    }
}

fn signed(value: i64) -> String {
    if value > 0 {
        format!("+{}", fmt_int(value))
    } else {
        fmt_int(value)
    }
}

const STYLE: &str = "body{font-family:-apple-system,'Noto Sans TC',sans-serif;margin:0;background:#f5f6f8;color:#222}\
nav{background:#1f3a5f;padding:10px 20px}nav a{color:#fff;margin-right:16px;text-decoration:none}\
main{padding:20px}table{border-collapse:collapse;width:100%;background:#fff}\
th,td{border:1px solid #ddd;padding:6px 8px;text-align:right}th{background:#eef1f5}\
td.text,th.text{text-align:left}.up{color:#c0392b}.down{color:#1e8449}.muted{color:#888}\
.card{background:#fff;padding:12px 16px;margin-bottom:16px;border-radius:6px}\
.high{background:#fff3cd}form.filters{margin-bottom:16px}form.filters>*{margin-right:8px}";

pub fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html lang=\"zh-Hant\"><head><meta charset=\"utf-8\">\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
         <title>{title} - ETF監控系統</title><style>{STYLE}</style></head><body>\
         <nav><a href=\"/\">首頁</a><a href=\"/holdings\">持股明細</a><a href=\"/changes\">持股變化</a>\
         <a href=\"/new-holdings\">新增持股</a><a href=\"/decreased-holdings\">減持</a>\
         <a href=\"/cross-holdings\">跨ETF持股</a><a href=\"/warrant-ranking\">權證排行</a>\
         <a href=\"/warrant-volume\">權證成交量</a><a href=\"/logout\">登出</a></nav>\
         <main><h1>{title}</h1>{body}</main></body></html>",
        title = escape_html(title),
        body = body,
    )
}

pub fn login_page(error: Option<&str>) -> String {
    let error = error
        .filter(|e| !e.is_empty())
        .map(|e| format!("<p class=\"up\">{}</p>", escape_html(e)))
        .unwrap_or_default();
    format!(
        "<!DOCTYPE html><html lang=\"zh-Hant\"><head><meta charset=\"utf-8\"><title>登入 - ETF監控系統</title>\
         <style>{STYLE}</style></head><body><main><div class=\"card\"><h1>ETF監控系統</h1>{error}\
         <form method=\"post\" action=\"/login\"><input type=\"password\" name=\"password\" placeholder=\"密碼\" autofocus>\
         <button type=\"submit\">登入</button></form></div></main></body></html>"
    )
}

pub fn error_page(status: u16, message: &str, suggestion: &str) -> String {
    layout(
        "系統錯誤",
        &format!(
            "<div class=\"card\"><p>HTTP {}</p><p>{}</p><p class=\"muted\">{}</p><p><a href=\"/\">返回首頁</a></p></div>",
            status,
            escape_html(message),
            escape_html(suggestion)
        ),
    )
}

pub fn rate_limited_page(retry_after_secs: u64) -> String {
    format!(
        "<!DOCTYPE html><html lang=\"zh-Hant\"><head><meta charset=\"utf-8\"><title>請求過於頻繁</title></head>\
         <body><h1>請求過於頻繁</h1><p>請在 {} 秒後再試。</p></body></html>",
        retry_after_secs
    )
}

fn option_list<'a>(values: impl Iterator<Item = (&'a str, String)>, selected: Option<&str>) -> String {
    values
        .map(|(value, label)| {
            let mark = if Some(value) == selected { " selected" } else { "" };
            format!(
                "<option value=\"{}\"{}>{}</option>",
                escape_html(value),
                mark,
                escape_html(&label)
            )
        })
        .collect()
}

fn date_select(dates: &[String], selected: Option<&str>) -> String {
    format!(
        "<select name=\"date\"><option value=\"\">最新</option>{}</select>",
        option_list(dates.iter().map(|d| (d.as_str(), d.clone())), selected)
    )
}

fn etf_select(etfs: &[EtfInfo], selected: Option<&str>) -> String {
    format!(
        "<select name=\"etf_code\"><option value=\"\">全部ETF</option>{}</select>",
        option_list(
            etfs.iter()
                .map(|e| (e.code.as_str(), format!("{} {}", e.code, e.name))),
            selected
        )
    )
}

fn filter_form(action: &str, inner: &str) -> String {
    format!(
        "<form class=\"filters\" method=\"get\" action=\"{}\">{}<button type=\"submit\">查詢</button></form>",
        action, inner
    )
}

fn empty_row(colspan: usize, text: &str) -> String {
    format!(
        "<tr><td class=\"text muted\" colspan=\"{}\">{}</td></tr>",
        colspan, text
    )
}

pub fn index_page(dates: &[String], etfs: &[EtfInfo]) -> String {
    let latest = dates
        .first()
        .map(|d| escape_html(d))
        .unwrap_or_else(|| "尚無資料".to_string());

    let etf_rows: String = etfs
        .iter()
        .map(|e| {
            format!(
                "<tr><td class=\"text\"><a href=\"/holdings/{code}\">{code}</a></td><td class=\"text\">{name}</td></tr>",
                code = escape_html(&e.code),
                name = escape_html(&e.name)
            )
        })
        .collect();

    let date_items: String = dates
        .iter()
        .take(10)
        .map(|d| format!("<li><a href=\"/holdings?date={d}\">{d}</a></li>", d = escape_html(d)))
        .collect();

    layout(
        "ETF監控系統",
        &format!(
            "<div class=\"card\">最新資料日期：{latest}</div>\
             <div class=\"card\"><h2>追蹤ETF</h2><table><tr><th class=\"text\">代碼</th><th class=\"text\">名稱</th></tr>{etf_rows}</table></div>\
             <div class=\"card\"><h2>可用日期</h2><ul>{date_items}</ul></div>\
             <div class=\"card\"><h2>手動爬取</h2>\
             <form method=\"post\" action=\"/manual-scrape\"><button type=\"submit\">爬取所有ETF</button></form>\
             <form method=\"post\" action=\"/manual-scrape-warrants\"><button type=\"submit\">爬取權證排行</button></form></div>"
        ),
    )
}

fn stats_card(stats: &ChangeStats) -> String {
    format!(
        "<div class=\"card\">共 {} 檔：新增 {}、增持 {}、減持 {}、移除 {}、無變化 {}</div>",
        stats.total,
        stats.new_count,
        stats.increased_count,
        stats.decreased_count,
        stats.removed_count,
        stats.no_change_count
    )
}

fn change_cell(row: &HoldingWithChange) -> String {
    match row.change_type {
        Some(kind) => {
            let delta = row.shares_increase - row.shares_decrease;
            let class = if delta >= 0 { "up" } else { "down" };
            format!(
                "<td class=\"text {}\">{} {}</td>",
                class,
                kind.label(),
                signed(delta)
            )
        }
        None => "<td class=\"text muted\">-</td>".to_string(),
    }
}

pub struct HoldingsView<'a> {
    pub date: Option<&'a str>,
    pub dates: &'a [String],
    pub etf_code: Option<&'a str>,
    pub etfs: &'a [EtfInfo],
    pub sort: HoldingSort,
    pub holdings: &'a [HoldingWithChange],
    pub stats: &'a ChangeStats,
}

pub fn holdings_page(view: &HoldingsView<'_>) -> String {
    let sort_options = option_list(
        HoldingSort::ALL
            .iter()
            .map(|s| (s.key(), s.display_name().to_string())),
        Some(view.sort.key()),
    );
    let filters = filter_form(
        "/holdings",
        &format!(
            "{}{}<select name=\"sort_by\">{}</select>",
            date_select(view.dates, view.date),
            etf_select(view.etfs, view.etf_code),
            sort_options
        ),
    );

    let rows: String = if view.holdings.is_empty() {
        empty_row(7, "沒有持股資料")
    } else {
        view.holdings
            .iter()
            .map(|row| {
                let h = &row.holding;
                format!(
                    "<tr><td class=\"text\">{}</td><td class=\"text\">{}</td><td class=\"text\">{}</td>\
                     <td>{:.2}%</td><td>{}</td><td class=\"text\">{}</td>{}</tr>",
                    escape_html(&h.etf_code),
                    escape_html(&h.stock_code),
                    escape_html(&h.stock_name),
                    h.weight,
                    fmt_int(h.shares),
                    escape_html(&h.unit),
                    change_cell(row)
                )
            })
            .collect()
    };

    layout(
        "持股明細",
        &format!(
            "{filters}{stats}<p class=\"muted\">排序：{sort}</p><table><tr><th class=\"text\">ETF</th>\
             <th class=\"text\">代碼 {code_icon}</th><th class=\"text\">名稱 {name_icon}</th><th>權重 {weight_icon}</th>\
             <th>股數 {shares_icon}</th><th class=\"text\">單位</th><th class=\"text\">變化</th></tr>{rows}</table>",
            stats = stats_card(view.stats),
            sort = view.sort.display_name(),
            code_icon = sort_icon(view.sort, "stock_code"),
            name_icon = sort_icon(view.sort, "stock_name"),
            weight_icon = sort_icon(view.sort, "weight"),
            shares_icon = sort_icon(view.sort, "shares"),
        ),
    )
}

pub fn etf_holdings_page(etf: &EtfInfo, date: Option<&str>, dates: &[String], holdings: &[Holding]) -> String {
    let filters = filter_form(
        &format!("/holdings/{}", escape_html(&etf.code)),
        &date_select(dates, date),
    );
    let total_weight: f64 = holdings.iter().map(|h| h.weight).sum();

    let rows: String = if holdings.is_empty() {
        empty_row(5, "沒有持股資料")
    } else {
        holdings
            .iter()
            .map(|h| {
                format!(
                    "<tr><td class=\"text\">{}</td><td class=\"text\">{}</td><td>{:.2}%</td><td>{}</td><td class=\"text\">{}</td></tr>",
                    escape_html(&h.stock_code),
                    escape_html(&h.stock_name),
                    h.weight,
                    fmt_int(h.shares),
                    escape_html(&h.unit)
                )
            })
            .collect()
    };

    layout(
        &format!("{} {}", etf.code, etf.name),
        &format!(
            "{filters}<div class=\"card\">資料日期：{date}，共 {count} 檔，權重合計 {total_weight:.2}%</div>\
             <table><tr><th class=\"text\">代碼</th><th class=\"text\">名稱</th><th>權重</th><th>股數</th><th class=\"text\">單位</th></tr>{rows}</table>",
            date = escape_html(holdings.first().map(|h| h.update_date.as_str()).or(date).unwrap_or("-")),
            count = holdings.len(),
        ),
    )
}

pub struct ChangeListView<'a> {
    pub date: Option<&'a str>,
    pub dates: &'a [String],
    pub etf_code: Option<&'a str>,
    pub etfs: &'a [EtfInfo],
}

impl ChangeListView<'_> {
    fn filters(&self, action: &str) -> String {
        filter_form(
            action,
            &format!(
                "{}{}",
                date_select(self.dates, self.date),
                etf_select(self.etfs, self.etf_code)
            ),
        )
    }
}

pub fn changes_page(view: &ChangeListView<'_>, changes: &[NamedChange]) -> String {
    let rows: String = if changes.is_empty() {
        empty_row(8, "沒有變化紀錄")
    } else {
        changes
            .iter()
            .map(|c| {
                let ch = &c.change;
                let delta = ch.new_shares - ch.old_shares;
                format!(
                    "<tr><td class=\"text\">{}</td><td class=\"text\">{} {}</td><td class=\"text\">{} {}</td>\
                     <td class=\"text\">{}</td><td>{}</td><td>{}</td><td class=\"{}\">{}</td><td>{:.2}% → {:.2}%</td></tr>",
                    escape_html(&ch.change_date),
                    escape_html(&ch.etf_code),
                    escape_html(&c.etf_name),
                    escape_html(&ch.stock_code),
                    escape_html(&ch.stock_name),
                    ch.change_type.label(),
                    fmt_int(ch.old_shares),
                    fmt_int(ch.new_shares),
                    if delta >= 0 { "up" } else { "down" },
                    signed(delta),
                    ch.old_weight,
                    ch.new_weight
                )
            })
            .collect()
    };

    layout(
        "持股變化",
        &format!(
            "{}<table><tr><th class=\"text\">日期</th><th class=\"text\">ETF</th><th class=\"text\">股票</th>\
             <th class=\"text\">類型</th><th>原股數</th><th>新股數</th><th>變化</th><th>權重</th></tr>{}</table>",
            view.filters("/changes"),
            rows
        ),
    )
}

pub fn new_holdings_page(view: &ChangeListView<'_>, holdings: &[NewHolding]) -> String {
    let rows: String = if holdings.is_empty() {
        empty_row(5, "當日沒有新增持股")
    } else {
        holdings
            .iter()
            .map(|h| {
                format!(
                    "<tr><td class=\"text\">{} {}</td><td class=\"text\">{}</td><td class=\"text\">{}</td><td>{:.2}%</td><td>{}</td></tr>",
                    escape_html(&h.etf_code),
                    escape_html(&h.etf_name),
                    escape_html(&h.stock_code),
                    escape_html(&h.stock_name),
                    h.weight,
                    fmt_int(h.shares)
                )
            })
            .collect()
    };

    layout(
        "新增持股",
        &format!(
            "{}<div class=\"card\">日期：{}，共 {} 筆</div><table><tr><th class=\"text\">ETF</th><th class=\"text\">代碼</th>\
             <th class=\"text\">名稱</th><th>權重</th><th>股數</th></tr>{}</table>",
            view.filters("/new-holdings"),
            escape_html(view.date.unwrap_or("-")),
            holdings.len(),
            rows
        ),
    )
}

pub fn decreased_holdings_page(view: &ChangeListView<'_>, holdings: &[DecreasedHolding]) -> String {
    let total: i64 = holdings.iter().map(|h| h.change_amount).sum();
    let rows: String = if holdings.is_empty() {
        empty_row(7, "沒有減持紀錄")
    } else {
        holdings
            .iter()
            .map(|h| {
                let ch = &h.change;
                format!(
                    "<tr><td class=\"text\">{}</td><td class=\"text\">{} {}</td><td class=\"text\">{} {}</td>\
                     <td class=\"text\">{}</td><td>{}</td><td>{}</td><td class=\"down\">-{}</td></tr>",
                    escape_html(&ch.change_date),
                    escape_html(&ch.etf_code),
                    escape_html(&h.etf_name),
                    escape_html(&ch.stock_code),
                    escape_html(&ch.stock_name),
                    h.change_label,
                    fmt_int(ch.old_shares),
                    fmt_int(ch.new_shares),
                    fmt_int(h.change_amount)
                )
            })
            .collect()
    };

    layout(
        "減持與移除",
        &format!(
            "{}<div class=\"card\">共 {} 筆，減少股數合計 {}</div><table><tr><th class=\"text\">日期</th><th class=\"text\">ETF</th>\
             <th class=\"text\">股票</th><th class=\"text\">類型</th><th>原股數</th><th>新股數</th><th>減少</th></tr>{}</table>",
            view.filters("/decreased-holdings"),
            holdings.len(),
            fmt_int(total),
            rows
        ),
    )
}

pub fn cross_holdings_page(date: Option<&str>, dates: &[String], holdings: &[CrossHolding]) -> String {
    let filters = filter_form("/cross-holdings", &date_select(dates, date));

    let rows: String = if holdings.is_empty() {
        empty_row(6, "沒有跨ETF持股")
    } else {
        holdings
            .iter()
            .map(|c| {
                let details: Vec<String> = c
                    .etf_details
                    .iter()
                    .map(|d| {
                        format!(
                            "{} {} ({}, {})",
                            escape_html(&d.etf_code),
                            escape_html(&d.etf_name),
                            fmt_int(d.shares),
                            signed(d.change)
                        )
                    })
                    .collect();
                format!(
                    "<tr><td class=\"text\">{} {}</td><td>{}</td><td>{}</td><td class=\"up\">+{}</td>\
                     <td class=\"down\">-{}</td><td class=\"text\">{}</td></tr>",
                    escape_html(&c.stock_code),
                    escape_html(&c.stock_name),
                    c.etf_count,
                    fmt_int(c.total_shares),
                    fmt_int(c.total_increase),
                    fmt_int(c.total_decrease),
                    details.join("<br>")
                )
            })
            .collect()
    };

    layout(
        "跨ETF持股",
        &format!(
            "{filters}<div class=\"card\">日期：{date}，共 {count} 檔</div><table><tr><th class=\"text\">股票</th><th>ETF數</th>\
             <th>總股數</th><th>增加</th><th>減少</th><th class=\"text\">明細</th></tr>{rows}</table>",
            date = escape_html(date.unwrap_or("-")),
            count = holdings.len(),
        ),
    )
}

pub struct WarrantRankingView<'a> {
    pub date: Option<&'a str>,
    pub dates: &'a [String],
    pub warrant_type: Option<WarrantType>,
    pub sort: WarrantSort,
    pub summary_sort: SummarySort,
    pub stats: &'a WarrantStatistics,
    pub summary: &'a [UnderlyingSummary],
    pub warrants: &'a [Warrant],
}

pub fn warrant_ranking_page(view: &WarrantRankingView<'_>) -> String {
    let type_options = option_list(
        WarrantType::ALL
            .iter()
            .map(|t| (t.as_str(), t.as_str().to_string())),
        view.warrant_type.map(|t| t.as_str()),
    );
    let sort_options = option_list(
        [
            WarrantSort::Ranking,
            WarrantSort::VolumeDesc,
            WarrantSort::VolumeAsc,
            WarrantSort::ChangePercentDesc,
            WarrantSort::ChangePercentAsc,
            WarrantSort::ImpliedVolatilityDesc,
            WarrantSort::ImpliedVolatilityAsc,
        ]
        .iter()
        .map(|s| (s.key(), s.key().to_string())),
        Some(view.sort.key()),
    );
    let summary_options = option_list(
        [
            SummarySort::WarrantCount,
            SummarySort::TotalVolume,
            SummarySort::AvgImpliedVolatility,
            SummarySort::UnderlyingName,
        ]
        .iter()
        .map(|s| (s.key(), s.key().to_string())),
        Some(view.summary_sort.key()),
    );
    let filters = filter_form(
        "/warrant-ranking",
        &format!(
            "{}<select name=\"warrant_type\"><option value=\"\">全部</option>{}</select>\
             <select name=\"sort_by\">{}</select><select name=\"summary_sort\">{}</select>",
            date_select(view.dates, view.date),
            type_options,
            sort_options,
            summary_options
        ),
    );

    let s = view.stats;
    let stats = format!(
        "<div class=\"card\">權證 {} 檔 (認購 {}、認售 {})，總成交量 {}，平均隱含波動率 {:.2}%，平均漲跌幅 {:.2}%，標的 {} 檔</div>",
        s.total_warrants,
        s.call_warrants,
        s.put_warrants,
        fmt_int(s.total_volume),
        s.avg_implied_volatility,
        s.avg_change_percent,
        s.unique_underlyings
    );

    let summary_rows: String = if view.summary.is_empty() {
        empty_row(5, "沒有標的統計")
    } else {
        view.summary
            .iter()
            .map(|u| {
                format!(
                    "<tr><td class=\"text\">{}</td><td class=\"text\">{}</td><td>{}</td><td>{}</td><td>{:.2}%</td></tr>",
                    escape_html(&u.underlying_name),
                    u.warrant_type,
                    u.warrant_count,
                    fmt_int(u.total_volume),
                    u.avg_implied_volatility
                )
            })
            .collect()
    };

    let warrant_rows: String = if view.warrants.is_empty() {
        empty_row(9, "沒有權證資料")
    } else {
        view.warrants
            .iter()
            .map(|w| {
                format!(
                    "<tr><td>{}-{}</td><td class=\"text\">{}</td><td class=\"text\">{}</td><td class=\"text\">{}</td>\
                     <td class=\"text\">{}</td><td>{:.2}</td><td>{:.2}</td><td>{}</td><td>{:.2}%</td></tr>",
                    w.page_number,
                    w.ranking,
                    escape_html(&w.warrant_code),
                    escape_html(&w.warrant_name),
                    escape_html(&w.underlying_name),
                    w.warrant_type,
                    w.close_price,
                    w.change_percent,
                    fmt_int(w.volume),
                    w.implied_volatility
                )
            })
            .collect()
    };

    layout(
        "權證排行",
        &format!(
            "{filters}{stats}<h2>標的統計</h2><table><tr><th class=\"text\">標的</th><th class=\"text\">類型</th>\
             <th>檔數</th><th>總成交量</th><th>平均隱波</th></tr>{summary_rows}</table>\
             <h2>排行</h2><table><tr><th>頁-名次</th><th class=\"text\">代碼</th><th class=\"text\">名稱</th>\
             <th class=\"text\">標的</th><th class=\"text\">類型</th><th>收盤</th><th>漲跌幅</th><th>成交量</th><th>隱波</th></tr>{warrant_rows}</table>"
        ),
    )
}

fn volume_table(title: &str, rows: &[VolumeComparison]) -> String {
    let body: String = if rows.is_empty() {
        empty_row(5, "沒有資料")
    } else {
        rows.iter()
            .map(|r| {
                format!(
                    "<tr class=\"{}\"><td class=\"text\">{}</td><td>{}</td><td>{}</td><td class=\"{}\">{}</td><td>{:.2}%</td></tr>",
                    if r.is_high_change { "high" } else { "" },
                    escape_html(&r.underlying_name),
                    fmt_int(r.current_volume),
                    fmt_int(r.five_day_avg),
                    if r.volume_diff >= 0 { "up" } else { "down" },
                    signed(r.volume_diff),
                    r.change_percent
                )
            })
            .collect()
    };
    format!(
        "<h2>{}</h2><table><tr><th class=\"text\">標的</th><th>當日成交量</th><th>五日均量</th><th>差額</th><th>變化率</th></tr>{}</table>",
        title, body
    )
}

pub fn warrant_volume_page(
    date: Option<&str>,
    dates: &[String],
    sort: VolumeSort,
    ascending: bool,
    analysis: &VolumeAnalysis,
) -> String {
    let sort_options = option_list(
        VolumeSort::ALL.iter().map(|s| (s.key(), s.key().to_string())),
        Some(sort.key()),
    );
    let order = if ascending { "asc" } else { "desc" };
    let order_options = option_list(
        [("desc", "降序".to_string()), ("asc", "升序".to_string())].into_iter(),
        Some(order),
    );
    let filters = filter_form(
        "/warrant-volume",
        &format!(
            "{}<select name=\"sort_by\">{}</select><select name=\"order\">{}</select>",
            date_select(dates, date),
            sort_options,
            order_options
        ),
    );

    let info = &analysis.analysis_info;
    let summary = format!(
        "<div class=\"card\">分析日期：{}，比較前 {} 個交易日 ({})；認購 {} 檔 (大幅變化 {})，認售 {} 檔 (大幅變化 {})</div>",
        escape_html(info.analysis_date.as_deref().unwrap_or("-")),
        info.previous_dates_count,
        escape_html(&info.previous_dates.join(", ")),
        info.call_underlyings_count,
        info.call_high_change_count,
        info.put_underlyings_count,
        info.put_high_change_count
    );

    layout(
        "權證成交量分析",
        &format!(
            "{}{}{}{}",
            filters,
            summary,
            volume_table("認購", &analysis.call_data),
            volume_table("認售", &analysis.put_data)
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<script>alert('x')</script>&\""),
            "&lt;script&gt;alert(&#x27;x&#x27;)&lt;/script&gt;&amp;&quot;"
        );
        assert_eq!(escape_html("台積電"), "台積電");
    }

    #[test]
    fn test_fmt_int() {
        assert_eq!(fmt_int(0), "0");
        assert_eq!(fmt_int(999), "999");
        assert_eq!(fmt_int(1000), "1,000");
        assert_eq!(fmt_int(-1234567), "-1,234,567");
        assert_eq!(signed(1500), "+1,500");
    }

    #[test]
    fn test_login_page_escapes_error() {
        let html = login_page(Some("<b>bad</b>"));
        assert!(html.contains("&lt;b&gt;bad&lt;/b&gt;"));
        assert!(html.contains("name=\"password\""));
    }
}
