//! Static help screen shown in HELP mode.

pub const HELP_TEXT: &str = "\
lbtop is an interactive dashboard for the load-balancer admin socket
====================================================================

It polls process information and per-proxy service statistics in near
realtime and renders them in several column-oriented views. The embedded
command line sends administrative commands (change server weight, put
servers into maintenance mode, ...) over the same socket, so results show
up on the next refresh.

Display mode reference:

ID  Mode    Description

1   STATUS  Health, session and queue statistics
2   TRAFFIC Connection and request rates plus traffic counters
3   HTTP    HTTP request rates and response code buckets
4   ERRORS  Health info, error counters and downtimes
5   CLI     Embedded command line for the admin socket

Keybind reference:

Key             Action

Hh?             Display this help screen
CTRL-C / Qq     Quit

TAB             Cycle mode forwards
SHIFT-TAB       Cycle mode backwards
ALT-n / ESC-n   Switch to mode n, where n is the numeric mode id
ESC-ESC         Jump to previous mode

ENTER           Display hotkey menu for the selected service
SPACE           Copy and paste the selected service identifier to the CLI

Stat views scroll with UP / DOWN / PGUP / PGDOWN / HOME / END.

The reverse colored cursor line selects a service instance; its unique
identifier [#<iid>/#<sid>] is displayed bottom right. Hit SPACE to paste
the identifier in the form \"pxname/svname\" into the CLI, for example:

1) Open the CLI
2) Type \"disable server \"
3) Switch back to some stat view using TAB / SHIFT-TAB
4) Select the server instance using UP / DOWN
5) Hit SPACE

Common administrative actions have hotkeys:

Hotkey      Action

F4          Restore initial server weight

F5          Decrease server weight:     - 10
F6          Decrease server weight:     -  1
F7          Increase server weight:     +  1
F8          Increase server weight:     + 10

F9          Enable server (return from maintenance mode)
F10         Disable server (put into maintenance mode)

Hotkey actions and server replies are logged on the CLI viewport, which
scrolls with PGUP / PGDOWN.

Header reference:

Node        configured name of the load-balancer node
Uptime      runtime since the remote process was started
Pipes       pipes currently used for kernel-based tcp splicing
Procs       number of remote processes
Tasks       number of active process tasks
Queue       number of queued process tasks (run queue)
Proxies     number of configured proxies
Services    number of configured services

In multiple modes:

NAME        name of the proxy and its services
W           configured weight of the service
STATUS      service status (UP/DOWN/NOLB/MAINT/MAINT(via)...)
CHECK       status of the last health check (reference below)

In STATUS mode:

ACT         server is active (server), number of active servers (backend)
BCK         server is backup (server), number of backup servers (backend)
QCUR        current queued requests
QMAX        max queued requests
SCUR        current sessions
SMAX        max sessions
SLIM        sessions limit
STOT        total sessions

In TRAFFIC mode:

LBTOT       total number of times a server was selected
RATE        number of sessions per second over the last elapsed second
RLIM        limit on new sessions per second
RMAX        max number of new sessions per second
BIN         bytes in
BOUT        bytes out

In HTTP mode:

RATE        HTTP requests per second over the last elapsed second
RMAX        max number of HTTP requests per second observed
RTOT        total number of HTTP requests received
1xx         number of HTTP responses with 1xx code
2xx         number of HTTP responses with 2xx code
3xx         number of HTTP responses with 3xx code
4xx         number of HTTP responses with 4xx code
5xx         number of HTTP responses with 5xx code
?xx         number of HTTP responses with other codes (protocol error)

In ERRORS mode:

CF          number of failed checks
CD          number of UP->DOWN transitions
CL          last status change
ECONN       connection errors
EREQ        request errors
ERSP        response errors
DREQ        denied requests
DRSP        denied responses
DOWN        total downtime

Health check status reference:

UNK         unknown
INI         initializing
SOCKERR     socket error
L4OK        check passed on layer 4, no upper layers testing enabled
L4TMOUT     layer 1-4 timeout
L4CON       layer 1-4 connection problem
L6OK        check passed on layer 6
L6TOUT      layer 6 (SSL) timeout
L6RSP       layer 6 invalid response - protocol error
L7OK        check passed on layer 7
L7OKC       check conditionally passed on layer 7
L7TOUT      layer 7 (HTTP/SMTP) timeout
L7RSP       layer 7 invalid response - protocol error
L7STS       layer 7 response error, for example HTTP 5xx
";
